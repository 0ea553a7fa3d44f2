//! Document validation
//!
//! Turns raw JSON input into a document that matches a collection's field
//! declarations. Validation is pure: relationship existence and uniqueness
//! need the database and are checked by the collection service.
//!
//! Rules:
//! - unknown input keys are dropped
//! - on create, absent or null fields receive their default
//! - on update, input is merged onto the stored document; read-only fields
//!   keep their stored value and `updatedAt` is refreshed
//! - every field is then type checked and required fields must be present
//!   and non-empty
//!
//! All errors are collected, not just the first one.

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::richtext::RichTextDocument;
use crate::schema::{Block, CollectionConfig, DefaultValue, Field, FieldType, UPDATED_AT};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-']+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$")
        .expect("email pattern is valid")
});

pub const MSG_REQUIRED: &str = "This field is required.";

/// What the validated input is used for
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Create,
    /// Partial update of a stored document
    Update { existing: &'a Map<String, Value> },
}

/// A single field failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path, e.g. `content.root.children.0.fields.text`
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// All failures of one validation run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The following field")?;
        if self.errors.len() != 1 {
            write!(f, "s")?;
        }
        write!(f, " are invalid: ")?;
        let paths: Vec<&str> = self.errors.iter().map(|e| e.path.as_str()).collect();
        write!(f, "{}", paths.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(path, message)],
        }
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors reported for an exact path
    pub fn for_path(&self, path: &str) -> Vec<&FieldError> {
        self.errors.iter().filter(|e| e.path == path).collect()
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.errors.iter().any(|e| e.path == path)
    }
}

/// Validate `input` against `collection` and return the normalized document
/// (without `id`).
pub fn validate(
    collection: &CollectionConfig,
    input: &Map<String, Value>,
    op: Operation<'_>,
) -> Result<Map<String, Value>, ValidationErrors> {
    let fields = collection.all_fields();
    let now = Utc::now();

    let mut doc = match op {
        Operation::Create => {
            let mut doc = Map::new();
            for field in &fields {
                match input.get(&field.name) {
                    Some(value) if !value.is_null() => {
                        doc.insert(field.name.clone(), value.clone());
                    }
                    _ => {
                        if let Some(default) = &field.default {
                            doc.insert(field.name.clone(), default_to_value(default, now));
                        }
                    }
                }
            }
            doc
        }
        Operation::Update { existing } => {
            let mut doc = Map::new();
            for field in &fields {
                let stored = existing.get(&field.name).cloned();
                let value = if field.read_only {
                    stored
                } else {
                    input.get(&field.name).cloned().or(stored)
                };
                if let Some(value) = value {
                    doc.insert(field.name.clone(), value);
                }
            }
            if collection.timestamps && fields.iter().any(|f| f.name == UPDATED_AT) {
                doc.insert(UPDATED_AT.to_string(), Value::from(format_date(now)));
            }
            doc
        }
    };

    let mut errors = ValidationErrors::default();
    validate_fields(&fields, &mut doc, "", &mut errors);

    if errors.is_empty() {
        Ok(doc)
    } else {
        Err(errors)
    }
}

/// Validate and normalize `doc` in place against a field list
///
/// `prefix` is prepended to field names in error paths.
pub fn validate_fields(
    fields: &[Field],
    doc: &mut Map<String, Value>,
    prefix: &str,
    errors: &mut ValidationErrors,
) {
    for field in fields {
        let path = join_path(prefix, &field.name);
        let value = doc.get(&field.name).cloned().unwrap_or(Value::Null);

        if value.is_null() {
            if field.required {
                errors.push(FieldError::new(path, MSG_REQUIRED));
            }
            continue;
        }

        if let Some(normalized) = validate_value(field, value, &path, errors) {
            doc.insert(field.name.clone(), normalized);
        }
    }
}

/// Type check one non-null value; returns its normalized form on success
fn validate_value(
    field: &Field,
    value: Value,
    path: &str,
    errors: &mut ValidationErrors,
) -> Option<Value> {
    let fail = |errors: &mut ValidationErrors, message: &str| -> Option<Value> {
        errors.push(FieldError::new(path, message));
        None
    };

    match &field.field_type {
        FieldType::Text | FieldType::Textarea => match value {
            Value::String(s) => {
                if field.required && s.is_empty() {
                    fail(errors, MSG_REQUIRED)
                } else {
                    Some(Value::String(s))
                }
            }
            _ => fail(errors, "This field must be a string."),
        },
        FieldType::Email => match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    if field.required {
                        fail(errors, MSG_REQUIRED)
                    } else {
                        Some(Value::Null)
                    }
                } else if !EMAIL_RE.is_match(trimmed) {
                    fail(errors, "Please enter a valid email address.")
                } else {
                    Some(Value::String(trimmed.to_lowercase()))
                }
            }
            _ => fail(errors, "Please enter a valid email address."),
        },
        FieldType::Number => match value.as_f64() {
            Some(n) if n.is_finite() => Some(value),
            _ => fail(errors, "Please enter a valid number."),
        },
        FieldType::Checkbox => match value {
            Value::Bool(_) => Some(value),
            _ => fail(errors, "This field must be true or false."),
        },
        FieldType::Date => match value.as_str().map(parse_date) {
            Some(Some(date)) => Some(Value::from(format_date(date))),
            _ => fail(errors, "Please enter a valid date."),
        },
        FieldType::Select { options } => {
            let valid = value
                .as_str()
                .map(|v| options.iter().any(|o| o.value == v))
                .unwrap_or(false);
            if valid {
                Some(value)
            } else {
                fail(errors, "This field has an invalid selection.")
            }
        }
        FieldType::Relationship { relation_to } | FieldType::Upload { relation_to } => {
            match relationship_id(&value) {
                Some(id) => Some(Value::from(id)),
                None => fail(
                    errors,
                    &format!("This field must reference a document in '{}'.", relation_to),
                ),
            }
        }
        FieldType::RichText { blocks } => validate_rich_text(field, &value, blocks, path, errors),
    }
}

fn validate_rich_text(
    field: &Field,
    value: &Value,
    blocks: &[Block],
    path: &str,
    errors: &mut ValidationErrors,
) -> Option<Value> {
    let mut doc = match RichTextDocument::parse(value) {
        Ok(doc) => doc,
        Err(err) => {
            errors.push(FieldError::new(
                join_path(path, &err.path),
                err.message,
            ));
            return None;
        }
    };

    if field.required && !doc.has_children() {
        errors.push(FieldError::new(path, MSG_REQUIRED));
        return None;
    }

    let before = errors.errors.len();
    doc.for_each_block_mut(|block_path, node| {
        let fields_path = format!("{}.{}.fields", path, block_path);
        let block = match node.block_type() {
            Some(slug) => blocks.iter().find(|b| b.slug == slug),
            None => {
                errors.push(FieldError::new(
                    join_path(&fields_path, "blockType"),
                    "Block is missing its blockType.",
                ));
                return;
            }
        };
        let Some(block) = block else {
            errors.push(FieldError::new(
                join_path(&fields_path, "blockType"),
                "This block type is not allowed here.",
            ));
            return;
        };

        validate_fields(&block.fields, &mut node.fields, &fields_path, errors);

        if node.id().map(str::is_empty).unwrap_or(true) {
            node.fields.insert(
                "id".to_string(),
                Value::from(uuid::Uuid::new_v4().simple().to_string()),
            );
        }
    });

    if errors.errors.len() > before {
        None
    } else {
        Some(doc.to_value())
    }
}

/// Accepts `7` or `{ "id": 7 }`
pub fn relationship_id(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Object(obj) => obj.get("id")?,
        other => other,
    };
    raw.as_i64().filter(|id| *id > 0)
}

/// Parse an RFC 3339 timestamp
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// `2024-05-01T12:00:00.000Z`
pub fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn default_to_value(default: &DefaultValue, now: DateTime<Utc>) -> Value {
    match default {
        DefaultValue::Value(v) => v.clone(),
        DefaultValue::Now => Value::from(format_date(now)),
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}.{}", prefix, name),
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::schema::{enrollments, users};
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Any string outside the option list is rejected for a select field.
        #[test]
        fn select_rejects_values_outside_options(status in "[a-z]{1,12}") {
            prop_assume!(!["active", "completed", "cancelled"].contains(&status.as_str()));
            let input = json!({ "user": 1, "course": 1, "status": status });
            let result = validate(
                &enrollments(),
                input.as_object().unwrap(),
                Operation::Create,
            );
            let errors = result.unwrap_err();
            prop_assert!(errors.has_path("status"));
        }

        /// Positive integer ids are accepted as-is for relationships.
        #[test]
        fn positive_ids_accepted(user in 1i64..i64::MAX, course in 1i64..i64::MAX) {
            let input = json!({ "user": user, "course": course });
            let doc = validate(&enrollments(), input.as_object().unwrap(), Operation::Create)
                .unwrap();
            prop_assert_eq!(&doc["user"], &json!(user));
            prop_assert_eq!(&doc["course"], &json!(course));
            prop_assert_eq!(&doc["status"], &json!("active"));
        }

        /// Arbitrary non-empty names pass; validation never rewrites them.
        #[test]
        fn names_are_kept_verbatim(first in ".{1,40}", last in ".{1,40}") {
            let input = json!({ "email": "x@example.com", "firstName": first, "lastName": last });
            let doc = validate(&users(), input.as_object().unwrap(), Operation::Create).unwrap();
            prop_assert_eq!(&doc["firstName"], &json!(first));
            prop_assert_eq!(&doc["lastName"], &json!(last));
        }
    }
}
