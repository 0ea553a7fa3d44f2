//! Enrollment service
//!
//! A user is enrolled in a given course at most once.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::{CollectionService, CollectionServiceError};
use crate::models::{Enrollment, EnrollmentStatus, ListParams};

const ENROLLMENTS: &str = "enrollments";

/// Enrollment service
pub struct EnrollmentService {
    documents: Arc<CollectionService>,
}

impl EnrollmentService {
    pub fn new(documents: Arc<CollectionService>) -> Self {
        Self { documents }
    }

    /// Enroll a user in a course with status `active`
    ///
    /// # Errors
    /// - `Validation` if the user or course doesn't exist
    /// - `Conflict` if the user is already enrolled in the course
    pub async fn enroll(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> Result<Enrollment, CollectionServiceError> {
        let mut input = Map::new();
        input.insert("user".to_string(), Value::from(user_id));
        input.insert("course".to_string(), Value::from(course_id));

        let doc = self.documents.create(ENROLLMENTS, &input).await?;
        tracing::info!(user_id, course_id, enrollment_id = doc.id, "User enrolled");
        Ok(doc.into_typed()?)
    }

    /// Enrollments of a user, oldest first
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Enrollment>, CollectionServiceError> {
        let params = ListParams::default().filter("user", user_id);
        self.documents
            .find_all(ENROLLMENTS, &params)
            .await?
            .into_iter()
            .map(|doc| doc.into_typed().map_err(CollectionServiceError::from))
            .collect()
    }

    pub async fn set_status(
        &self,
        id: i64,
        status: EnrollmentStatus,
    ) -> Result<Enrollment, CollectionServiceError> {
        let mut patch = Map::new();
        patch.insert("status".to_string(), Value::from(status.as_str()));
        let doc = self.documents.update(ENROLLMENTS, id, &patch).await?;
        Ok(doc.into_typed()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxDocumentRepository;
    use crate::db::{create_test_pool, sync, DynDatabasePool};
    use crate::schema::lms_schema;
    use serde_json::json;

    struct Fixture {
        _pool: DynDatabasePool,
        documents: Arc<CollectionService>,
        service: EnrollmentService,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        sync::sync_schema(&pool, lms_schema())
            .await
            .expect("Failed to sync schema");

        let repo = SqlxDocumentRepository::boxed(pool.clone());
        let documents = Arc::new(CollectionService::new(lms_schema(), repo));
        Fixture {
            _pool: pool,
            service: EnrollmentService::new(documents.clone()),
            documents,
        }
    }

    async fn create(documents: &CollectionService, slug: &str, input: Value) -> i64 {
        documents
            .create(slug, input.as_object().unwrap())
            .await
            .expect("Failed to create fixture document")
            .id
    }

    #[tokio::test]
    async fn test_enroll_defaults() {
        let f = setup().await;
        let user = create(
            &f.documents,
            "users",
            json!({ "email": "s@example.com", "firstName": "S", "lastName": "T" }),
        )
        .await;
        let course = create(&f.documents, "courses", json!({ "title": "Rust" })).await;

        let enrollment = f.service.enroll(user, course).await.unwrap();
        assert_eq!(enrollment.user, user);
        assert_eq!(enrollment.course, course);
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
        assert!(enrollment.enrolled_at <= chrono::Utc::now());
    }

    #[tokio::test]
    async fn test_duplicate_enrollment_conflicts() {
        let f = setup().await;
        let user = create(
            &f.documents,
            "users",
            json!({ "email": "s@example.com", "firstName": "S", "lastName": "T" }),
        )
        .await;
        let rust = create(&f.documents, "courses", json!({ "title": "Rust" })).await;
        let go = create(&f.documents, "courses", json!({ "title": "Go" })).await;

        f.service.enroll(user, rust).await.unwrap();
        let err = f.service.enroll(user, rust).await.unwrap_err();
        assert!(matches!(err, CollectionServiceError::Conflict(_)));

        f.service.enroll(user, go).await.unwrap();
        let courses: Vec<i64> = f
            .service
            .list_for_user(user)
            .await
            .unwrap()
            .iter()
            .map(|e| e.course)
            .collect();
        assert_eq!(courses, vec![rust, go]);
    }

    #[tokio::test]
    async fn test_enroll_missing_user() {
        let f = setup().await;
        let course = create(&f.documents, "courses", json!({ "title": "Rust" })).await;

        let err = f.service.enroll(404, course).await.unwrap_err();
        assert!(matches!(err, CollectionServiceError::Validation(ref e) if e.has_path("user")));
    }

    #[tokio::test]
    async fn test_set_status_keeps_enrolled_at() {
        let f = setup().await;
        let user = create(
            &f.documents,
            "users",
            json!({ "email": "s@example.com", "firstName": "S", "lastName": "T" }),
        )
        .await;
        let course = create(&f.documents, "courses", json!({ "title": "Rust" })).await;
        let enrollment = f.service.enroll(user, course).await.unwrap();

        let done = f
            .service
            .set_status(enrollment.id, EnrollmentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, EnrollmentStatus::Completed);
        assert_eq!(done.enrolled_at, enrollment.enrolled_at);
    }
}
