//! User service
//!
//! Typed access to the `users` collection: account creation, lookup by
//! email and role changes. Authentication itself is not handled here.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::{CollectionService, CollectionServiceError};
use crate::models::{to_input, CreateUserInput, ListParams, User, UserRole};

const USERS: &str = "users";

/// User service
pub struct UserService {
    documents: Arc<CollectionService>,
}

impl UserService {
    pub fn new(documents: Arc<CollectionService>) -> Self {
        Self { documents }
    }

    /// Create a user; the role defaults to `student`
    ///
    /// # Errors
    /// - `Validation` for a malformed email or empty names
    /// - `Conflict` if the email is taken
    pub async fn create_user(&self, input: &CreateUserInput) -> Result<User, CollectionServiceError> {
        let doc = self.documents.create(USERS, &to_input(input)?).await?;
        Ok(doc.into_typed()?)
    }

    /// Find a user by email, case-insensitively
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, CollectionServiceError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Ok(None);
        }

        let params = ListParams::new(1, 1).filter("email", email);
        let page = self.documents.find(USERS, &params).await?;
        match page.items.into_iter().next() {
            Some(doc) => Ok(Some(doc.into_typed()?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, CollectionServiceError> {
        match self.documents.find_by_id(USERS, id).await? {
            Some(doc) => Ok(Some(doc.into_typed()?)),
            None => Ok(None),
        }
    }

    /// Change a user's role
    pub async fn set_role(&self, id: i64, role: UserRole) -> Result<User, CollectionServiceError> {
        let mut patch = Map::new();
        patch.insert("role".to_string(), Value::from(role.as_str()));
        let doc = self.documents.update(USERS, id, &patch).await?;
        tracing::info!(user_id = id, role = %role, "User role changed");
        Ok(doc.into_typed()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxDocumentRepository;
    use crate::db::{create_test_pool, sync, DynDatabasePool};
    use crate::schema::lms_schema;

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        sync::sync_schema(&pool, lms_schema())
            .await
            .expect("Failed to sync schema");

        let repo = SqlxDocumentRepository::boxed(pool.clone());
        let documents = Arc::new(CollectionService::new(lms_schema(), repo));
        (pool, UserService::new(documents))
    }

    #[tokio::test]
    async fn test_create_user_defaults_to_student() {
        let (_pool, service) = setup_test_service().await;

        let user = service
            .create_user(&CreateUserInput::new("grace@example.com", "Grace", "Hopper"))
            .await
            .expect("Failed to create user");

        assert!(user.id > 0);
        assert_eq!(user.role, UserRole::Student);
        assert_eq!(user.full_name(), "Grace Hopper");
        assert!(!user.can_teach());
    }

    #[tokio::test]
    async fn test_create_user_with_role() {
        let (_pool, service) = setup_test_service().await;

        let user = service
            .create_user(
                &CreateUserInput::new("alan@example.com", "Alan", "Turing")
                    .with_role(UserRole::Instructor),
            )
            .await
            .unwrap();
        assert_eq!(user.role, UserRole::Instructor);
        assert!(user.can_teach());
    }

    #[tokio::test]
    async fn test_create_user_rejects_bad_email() {
        let (_pool, service) = setup_test_service().await;

        let result = service
            .create_user(&CreateUserInput::new("not-an-email", "A", "B"))
            .await;
        assert!(matches!(
            result,
            Err(CollectionServiceError::Validation(ref e)) if e.has_path("email")
        ));
    }

    #[tokio::test]
    async fn test_find_by_email_is_case_insensitive() {
        let (_pool, service) = setup_test_service().await;
        let created = service
            .create_user(&CreateUserInput::new("Linus@Example.com", "Linus", "T"))
            .await
            .unwrap();

        let found = service
            .find_by_email("  LINUS@example.COM ")
            .await
            .unwrap()
            .expect("user should be found");
        assert_eq!(found.id, created.id);
        assert_eq!(found.email, "linus@example.com");

        assert!(service.find_by_email("nobody@example.com").await.unwrap().is_none());
        assert!(service.find_by_email("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_role() {
        let (_pool, service) = setup_test_service().await;
        let user = service
            .create_user(&CreateUserInput::new("m@example.com", "Margaret", "H"))
            .await
            .unwrap();

        let updated = service.set_role(user.id, UserRole::Admin).await.unwrap();
        assert!(updated.is_admin());
        assert_eq!(updated.created_at, user.created_at);

        let fetched = service.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.role, UserRole::Admin);

        let missing = service.set_role(999, UserRole::Admin).await;
        assert!(matches!(missing, Err(CollectionServiceError::NotFound { .. })));
    }
}
