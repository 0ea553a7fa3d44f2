//! Lesson model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::richtext::RichTextDocument;

/// A lesson always belongs to exactly one course
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    /// Rich-text document
    pub content: Value,
    pub published: bool,
    pub course: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    /// Text of the lesson content without markup
    pub fn plain_text(&self) -> String {
        RichTextDocument::parse(&self.content)
            .map(|doc| doc.plain_text())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonInput {
    pub title: String,
    pub content: Value,
    pub course: i64,
    /// Falls back to the collection default (`false`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}
