//! Declarative collection schema
//!
//! Collections are described as data: a slug, an ordered list of fields and a
//! few collection-level switches (auth, upload, timestamps). Everything else in
//! the crate (validation, table sync, type generation) is driven by these
//! declarations.
//!
//! ```ignore
//! let lessons = CollectionConfig::new("lessons")
//!     .use_as_title("title")
//!     .fields(vec![
//!         Field::new("title", FieldType::Text).required(),
//!         Field::new("published", FieldType::Checkbox).default_value(false),
//!     ]);
//! ```

mod blocks;
mod collections;

pub use blocks::{text_block, TEXT_BLOCK};
pub use collections::{courses, enrollments, lessons, lms_schema, media, users};

use serde_json::Value;
use std::collections::HashSet;

/// A selectable option of a `select` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Field type with its type-specific settings
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Single-line string
    Text,
    /// Multi-line string
    Textarea,
    /// String holding an email address
    Email,
    /// Finite number
    Number,
    /// Boolean
    Checkbox,
    /// Point in time, exchanged as an RFC 3339 string
    Date,
    /// One value out of a fixed option list
    Select { options: Vec<SelectOption> },
    /// Reference to a document of another collection
    Relationship { relation_to: String },
    /// Reference to a document of an upload collection
    Upload { relation_to: String },
    /// Rich-text document that may embed the listed blocks
    RichText { blocks: Vec<Block> },
}

impl FieldType {
    /// Build a select type from `(label, value)` pairs
    pub fn select(options: &[(&str, &str)]) -> Self {
        FieldType::Select {
            options: options
                .iter()
                .map(|(label, value)| SelectOption::new(*label, *value))
                .collect(),
        }
    }

    pub fn relationship(relation_to: impl Into<String>) -> Self {
        FieldType::Relationship {
            relation_to: relation_to.into(),
        }
    }

    pub fn upload(relation_to: impl Into<String>) -> Self {
        FieldType::Upload {
            relation_to: relation_to.into(),
        }
    }

    pub fn rich_text(blocks: Vec<Block>) -> Self {
        FieldType::RichText { blocks }
    }

    /// Short type name, as used in error messages and generated docs
    pub fn kind(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Email => "email",
            FieldType::Number => "number",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::Select { .. } => "select",
            FieldType::Relationship { .. } => "relationship",
            FieldType::Upload { .. } => "upload",
            FieldType::RichText { .. } => "richText",
        }
    }

    /// Target collection of a relationship or upload field
    pub fn relation_to(&self) -> Option<&str> {
        match self {
            FieldType::Relationship { relation_to } | FieldType::Upload { relation_to } => {
                Some(relation_to)
            }
            _ => None,
        }
    }
}

/// Default value of a field, applied on create when the input omits it
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A fixed JSON value
    Value(Value),
    /// The current time
    Now,
}

/// A single field declaration
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub label: Option<String>,
    pub read_only: bool,
    pub unique: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
            label: None,
            read_only: false,
            unique: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = Some(DefaultValue::Now);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Read-only fields keep their stored value on update
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Human readable label, falling back to the field name
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Database column backing this field
    ///
    /// `firstName` -> `first_name`, relationship `course` -> `course_id`.
    pub fn column_name(&self) -> String {
        let base = to_snake_case(&self.name);
        match self.field_type {
            FieldType::Relationship { .. } | FieldType::Upload { .. } => format!("{}_id", base),
            _ => base,
        }
    }
}

/// A block that can be embedded in a rich-text field
#[derive(Debug, Clone)]
pub struct Block {
    pub slug: String,
    pub fields: Vec<Field>,
}

impl Block {
    pub fn new(slug: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            slug: slug.into(),
            fields,
        }
    }
}

/// A collection declaration
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub slug: String,
    pub fields: Vec<Field>,
    /// Auth collections get an implicit unique `email` field
    pub auth: bool,
    /// Upload collections get implicit file metadata fields
    pub upload: bool,
    /// Adds `createdAt` / `updatedAt` unless declared explicitly
    pub timestamps: bool,
    pub use_as_title: Option<String>,
    /// Field-name groups whose combined values must be unique
    pub unique_together: Vec<Vec<String>>,
}

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

impl CollectionConfig {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            fields: Vec::new(),
            auth: false,
            upload: false,
            timestamps: true,
            use_as_title: None,
            unique_together: Vec::new(),
        }
    }

    pub fn fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn auth(mut self) -> Self {
        self.auth = true;
        self
    }

    pub fn upload(mut self) -> Self {
        self.upload = true;
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn use_as_title(mut self, field: impl Into<String>) -> Self {
        self.use_as_title = Some(field.into());
        self
    }

    pub fn unique_together(mut self, fields: &[&str]) -> Self {
        self.unique_together
            .push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Declared fields plus the implicit auth, upload and timestamp fields,
    /// in storage order.
    pub fn all_fields(&self) -> Vec<Field> {
        let declared = |name: &str| self.fields.iter().any(|f| f.name == name);
        let mut fields = Vec::with_capacity(self.fields.len() + 8);

        if self.auth && !declared("email") {
            fields.push(Field::new("email", FieldType::Email).required().unique());
        }

        fields.extend(self.fields.iter().cloned());

        if self.upload {
            let implicit = [
                Field::new("url", FieldType::Text),
                Field::new("filename", FieldType::Text).unique(),
                Field::new("mimeType", FieldType::Text),
                Field::new("filesize", FieldType::Number),
                Field::new("width", FieldType::Number),
                Field::new("height", FieldType::Number),
            ];
            for field in implicit {
                if !declared(&field.name) {
                    fields.push(field);
                }
            }
        }

        if self.timestamps {
            if !declared(UPDATED_AT) {
                fields.push(
                    Field::new(UPDATED_AT, FieldType::Date)
                        .required()
                        .default_now()
                        .read_only(),
                );
            }
            if !declared(CREATED_AT) {
                fields.push(
                    Field::new(CREATED_AT, FieldType::Date)
                        .required()
                        .default_now()
                        .read_only(),
                );
            }
        }

        fields
    }

    /// Look up a field (declared or implicit) by name
    pub fn field(&self, name: &str) -> Option<Field> {
        self.all_fields().into_iter().find(|f| f.name == name)
    }

    /// Field used as the document title, falling back to `id`
    pub fn title_field(&self) -> &str {
        self.use_as_title.as_deref().unwrap_or("id")
    }
}

/// Error raised when a schema is internally inconsistent
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Duplicate collection slug: {0}")]
    DuplicateCollection(String),
    #[error("Duplicate field '{field}' in {owner}")]
    DuplicateField { owner: String, field: String },
    #[error("Field '{field}' in '{collection}' relates to unknown collection '{target}'")]
    UnknownRelation {
        collection: String,
        field: String,
        target: String,
    },
    #[error("Field '{field}' in '{collection}' uploads to '{target}', which is not an upload collection")]
    NotAnUploadCollection {
        collection: String,
        field: String,
        target: String,
    },
    #[error("Default of select field '{field}' in '{owner}' is not one of its options")]
    InvalidSelectDefault { owner: String, field: String },
    #[error("Field '{field}' referenced by '{collection}' does not exist")]
    UnknownField { collection: String, field: String },
    #[error("Duplicate block slug '{block}' in field '{field}'")]
    DuplicateBlock { field: String, block: String },
}

/// Registry of all collections
#[derive(Debug, Clone, Default)]
pub struct Schema {
    collections: Vec<CollectionConfig>,
}

impl Schema {
    pub fn new(collections: Vec<CollectionConfig>) -> Self {
        Self { collections }
    }

    /// All collections in declaration order
    pub fn collections(&self) -> &[CollectionConfig] {
        &self.collections
    }

    /// Look up a collection by slug
    pub fn get(&self, slug: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.slug == slug)
    }

    pub fn slugs(&self) -> Vec<&str> {
        self.collections.iter().map(|c| c.slug.as_str()).collect()
    }

    /// Relationship and upload fields, across all collections, that point at `target`.
    ///
    /// Returns `(collection, field)` pairs.
    pub fn references_to(&self, target: &str) -> Vec<(&CollectionConfig, Field)> {
        let mut refs = Vec::new();
        for collection in &self.collections {
            for field in collection.all_fields() {
                if field.field_type.relation_to() == Some(target) {
                    refs.push((collection, field));
                }
            }
        }
        refs
    }

    /// Check internal consistency of the declarations
    pub fn check(&self) -> Result<(), SchemaError> {
        let mut slugs = HashSet::new();
        for collection in &self.collections {
            if !slugs.insert(collection.slug.as_str()) {
                return Err(SchemaError::DuplicateCollection(collection.slug.clone()));
            }
        }

        for collection in &self.collections {
            let fields = collection.all_fields();
            check_fields(&collection.slug, &fields)?;

            for field in &fields {
                match &field.field_type {
                    FieldType::Relationship { relation_to } => {
                        if self.get(relation_to).is_none() {
                            return Err(SchemaError::UnknownRelation {
                                collection: collection.slug.clone(),
                                field: field.name.clone(),
                                target: relation_to.clone(),
                            });
                        }
                    }
                    FieldType::Upload { relation_to } => match self.get(relation_to) {
                        None => {
                            return Err(SchemaError::UnknownRelation {
                                collection: collection.slug.clone(),
                                field: field.name.clone(),
                                target: relation_to.clone(),
                            })
                        }
                        Some(target) if !target.upload => {
                            return Err(SchemaError::NotAnUploadCollection {
                                collection: collection.slug.clone(),
                                field: field.name.clone(),
                                target: relation_to.clone(),
                            })
                        }
                        Some(_) => {}
                    },
                    _ => {}
                }
            }

            let names: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
            let referenced = collection
                .use_as_title
                .iter()
                .chain(collection.unique_together.iter().flatten());
            for name in referenced {
                if name != "id" && !names.contains(name.as_str()) {
                    return Err(SchemaError::UnknownField {
                        collection: collection.slug.clone(),
                        field: name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn check_fields(owner: &str, fields: &[Field]) -> Result<(), SchemaError> {
    let mut names = HashSet::new();
    for field in fields {
        if !names.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateField {
                owner: owner.to_string(),
                field: field.name.clone(),
            });
        }

        match &field.field_type {
            FieldType::Select { options } => {
                if let Some(DefaultValue::Value(default)) = &field.default {
                    let valid = default
                        .as_str()
                        .map(|d| options.iter().any(|o| o.value == d))
                        .unwrap_or(false);
                    if !valid {
                        return Err(SchemaError::InvalidSelectDefault {
                            owner: owner.to_string(),
                            field: field.name.clone(),
                        });
                    }
                }
            }
            FieldType::RichText { blocks } => {
                let mut block_slugs = HashSet::new();
                for block in blocks {
                    if !block_slugs.insert(block.slug.as_str()) {
                        return Err(SchemaError::DuplicateBlock {
                            field: field.name.clone(),
                            block: block.slug.clone(),
                        });
                    }
                    check_fields(&format!("block '{}'", block.slug), &block.fields)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// `firstName` -> `first_name`, `text-block` -> `text_block`
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '-' {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("firstName"), "first_name");
        assert_eq!(to_snake_case("mimeType"), "mime_type");
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("title"), "title");
        assert_eq!(to_snake_case("text-block"), "text_block");
    }

    #[test]
    fn test_column_name_for_relationship() {
        let field = Field::new("course", FieldType::relationship("courses"));
        assert_eq!(field.column_name(), "course_id");
        let field = Field::new("thumbnail", FieldType::upload("media"));
        assert_eq!(field.column_name(), "thumbnail_id");
    }

    #[test]
    fn test_auth_collection_gets_email_first() {
        let collection = CollectionConfig::new("members")
            .auth()
            .fields(vec![Field::new("nick", FieldType::Text)]);
        let fields = collection.all_fields();
        assert_eq!(fields[0].name, "email");
        assert!(fields[0].required);
        assert!(fields[0].unique);
        assert_eq!(fields[1].name, "nick");
    }

    #[test]
    fn test_declared_created_at_replaces_implicit() {
        let collection = CollectionConfig::new("notes").fields(vec![Field::new(
            CREATED_AT,
            FieldType::Date,
        )
        .default_now()
        .read_only()]);
        let fields = collection.all_fields();
        let created: Vec<_> = fields.iter().filter(|f| f.name == CREATED_AT).collect();
        assert_eq!(created.len(), 1);
        assert!(!created[0].required);
        assert!(fields.iter().any(|f| f.name == UPDATED_AT));
    }

    #[test]
    fn test_timestamps_can_be_disabled() {
        let collection = CollectionConfig::new("raw").timestamps(false);
        assert!(collection.all_fields().is_empty());
    }

    #[test]
    fn test_upload_collection_gets_metadata_fields() {
        let collection = CollectionConfig::new("files").upload();
        let names: Vec<String> = collection.all_fields().into_iter().map(|f| f.name).collect();
        for expected in ["url", "filename", "mimeType", "filesize", "width", "height"] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_check_rejects_unknown_relation() {
        let schema = Schema::new(vec![CollectionConfig::new("lessons").fields(vec![
            Field::new("course", FieldType::relationship("courses")).required(),
        ])]);
        assert_eq!(
            schema.check(),
            Err(SchemaError::UnknownRelation {
                collection: "lessons".to_string(),
                field: "course".to_string(),
                target: "courses".to_string(),
            })
        );
    }

    #[test]
    fn test_check_rejects_upload_to_plain_collection() {
        let schema = Schema::new(vec![
            CollectionConfig::new("docs"),
            CollectionConfig::new("posts")
                .fields(vec![Field::new("cover", FieldType::upload("docs"))]),
        ]);
        assert!(matches!(
            schema.check(),
            Err(SchemaError::NotAnUploadCollection { .. })
        ));
    }

    #[test]
    fn test_check_rejects_duplicate_slug_and_field() {
        let schema = Schema::new(vec![CollectionConfig::new("a"), CollectionConfig::new("a")]);
        assert_eq!(
            schema.check(),
            Err(SchemaError::DuplicateCollection("a".to_string()))
        );

        let schema = Schema::new(vec![CollectionConfig::new("a").fields(vec![
            Field::new("x", FieldType::Text),
            Field::new("x", FieldType::Number),
        ])]);
        assert!(matches!(
            schema.check(),
            Err(SchemaError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_check_rejects_bad_select_default() {
        let schema = Schema::new(vec![CollectionConfig::new("a").fields(vec![Field::new(
            "level",
            FieldType::select(&[("Low", "low"), ("High", "high")]),
        )
        .default_value("medium")])]);
        assert!(matches!(
            schema.check(),
            Err(SchemaError::InvalidSelectDefault { .. })
        ));
    }

    #[test]
    fn test_check_rejects_unknown_title_field() {
        let schema = Schema::new(vec![CollectionConfig::new("a").use_as_title("name")]);
        assert!(matches!(schema.check(), Err(SchemaError::UnknownField { .. })));
    }

    #[test]
    fn test_check_rejects_duplicate_block_slug() {
        let schema = Schema::new(vec![CollectionConfig::new("pages").fields(vec![Field::new(
            "body",
            FieldType::rich_text(vec![text_block(), text_block()]),
        )])]);
        assert_eq!(
            schema.check(),
            Err(SchemaError::DuplicateBlock {
                field: "body".to_string(),
                block: TEXT_BLOCK.to_string(),
            })
        );

        let schema = Schema::new(vec![CollectionConfig::new("pages").fields(vec![Field::new(
            "body",
            FieldType::rich_text(vec![text_block()]),
        )])]);
        assert_eq!(schema.check(), Ok(()));
    }

    #[test]
    fn test_check_rejects_unknown_unique_together_field() {
        let schema = Schema::new(vec![CollectionConfig::new("a")
            .fields(vec![Field::new("name", FieldType::Text)])
            .unique_together(&["name", "missing"])]);
        assert!(matches!(schema.check(), Err(SchemaError::UnknownField { .. })));
    }

    #[test]
    fn test_lms_schema_is_consistent() {
        lms_schema().check().expect("LMS schema should be consistent");
        assert_eq!(
            lms_schema().slugs(),
            vec!["users", "media", "courses", "lessons", "enrollments"]
        );
    }

    #[test]
    fn test_references_to_courses() {
        let refs: Vec<(String, String)> = lms_schema()
            .references_to("courses")
            .into_iter()
            .map(|(c, f)| (c.slug.clone(), f.name))
            .collect();
        assert_eq!(
            refs,
            vec![
                ("lessons".to_string(), "course".to_string()),
                ("enrollments".to_string(), "course".to_string()),
            ]
        );
    }
}
