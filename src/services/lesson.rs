//! Lesson service
//!
//! Lessons belong to exactly one course; their content is a rich-text
//! document that may embed `text-block` blocks.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::{CollectionService, CollectionServiceError};
use crate::models::{to_input, CreateLessonInput, Lesson, ListParams};

const LESSONS: &str = "lessons";

/// Lesson service
pub struct LessonService {
    documents: Arc<CollectionService>,
}

impl LessonService {
    pub fn new(documents: Arc<CollectionService>) -> Self {
        Self { documents }
    }

    /// Create a lesson; unpublished unless `input.published` says otherwise
    ///
    /// # Errors
    /// - `Validation` if title, content or course is missing or invalid, or
    ///   the course doesn't exist
    pub async fn create_lesson(
        &self,
        input: &CreateLessonInput,
    ) -> Result<Lesson, CollectionServiceError> {
        let doc = self.documents.create(LESSONS, &to_input(input)?).await?;
        Ok(doc.into_typed()?)
    }

    /// Lessons of a course in creation order
    pub async fn list_for_course(
        &self,
        course_id: i64,
        published_only: bool,
    ) -> Result<Vec<Lesson>, CollectionServiceError> {
        let mut params = ListParams::default().filter("course", course_id);
        if published_only {
            params = params.filter("published", true);
        }

        self.documents
            .find_all(LESSONS, &params)
            .await?
            .into_iter()
            .map(|doc| doc.into_typed().map_err(CollectionServiceError::from))
            .collect()
    }

    /// Mark a lesson as published
    pub async fn publish(&self, id: i64) -> Result<Lesson, CollectionServiceError> {
        let mut patch = Map::new();
        patch.insert("published".to_string(), Value::Bool(true));
        let doc = self.documents.update(LESSONS, id, &patch).await?;
        tracing::info!(lesson_id = id, "Lesson published");
        Ok(doc.into_typed()?)
    }
}
