//! The LMS collections

use once_cell::sync::Lazy;

use super::{text_block, CollectionConfig, Field, FieldType, Schema, CREATED_AT};

static LMS_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(vec![users(), media(), courses(), lessons(), enrollments()])
});

/// The full schema served by this backend
pub fn lms_schema() -> &'static Schema {
    &LMS_SCHEMA
}

/// Users. The `email` field comes from the collection being an auth collection.
pub fn users() -> CollectionConfig {
    CollectionConfig::new("users")
        .auth()
        .use_as_title("email")
        .fields(vec![
            Field::new("firstName", FieldType::Text)
                .required()
                .default_value(""),
            Field::new("lastName", FieldType::Text)
                .required()
                .default_value(""),
            Field::new(
                "role",
                FieldType::select(&[
                    ("Student", "student"),
                    ("Instructor", "instructor"),
                    ("Admin", "admin"),
                ]),
            )
            .default_value("student"),
        ])
}

/// Uploaded files. Only metadata is stored.
pub fn media() -> CollectionConfig {
    CollectionConfig::new("media")
        .upload()
        .use_as_title("alt")
        .fields(vec![Field::new("alt", FieldType::Text).required()])
}

pub fn courses() -> CollectionConfig {
    CollectionConfig::new("courses")
        .use_as_title("title")
        .fields(vec![
            Field::new("title", FieldType::Text).required(),
            Field::new("description", FieldType::Textarea),
            Field::new("instructor", FieldType::relationship("users")),
            Field::new("thumbnail", FieldType::upload("media")),
            Field::new("published", FieldType::Checkbox)
                .label("Published")
                .default_value(false),
        ])
}

pub fn lessons() -> CollectionConfig {
    CollectionConfig::new("lessons")
        .use_as_title("title")
        .fields(vec![
            Field::new("title", FieldType::Text).required(),
            Field::new("content", FieldType::rich_text(vec![text_block()])).required(),
            Field::new("published", FieldType::Checkbox)
                .label("Published")
                .default_value(false),
            Field::new("course", FieldType::relationship("courses")).required(),
            Field::new(CREATED_AT, FieldType::Date)
                .read_only()
                .default_now(),
        ])
}

/// Links a user to a course. A user is enrolled in a course at most once.
pub fn enrollments() -> CollectionConfig {
    CollectionConfig::new("enrollments")
        .unique_together(&["user", "course"])
        .fields(vec![
            Field::new("user", FieldType::relationship("users")).required(),
            Field::new("course", FieldType::relationship("courses")).required(),
            Field::new(
                "status",
                FieldType::select(&[
                    ("Active", "active"),
                    ("Completed", "completed"),
                    ("Cancelled", "cancelled"),
                ]),
            )
            .default_value("active"),
            Field::new("enrolledAt", FieldType::Date)
                .read_only()
                .default_now(),
        ])
}
