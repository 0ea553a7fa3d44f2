//! Collection service
//!
//! Generic document operations for every collection in the schema:
//! - Validation and default application (see `validation`)
//! - Relationship targets must exist
//! - Unique fields and unique field groups are enforced before writing
//! - A document that other documents reference cannot be deleted

use anyhow::Context;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::db::repositories::{is_foreign_key_violation, is_unique_violation, DocumentRepository};
use crate::models::{Document, ListParams, PagedResult};
use crate::schema::{CollectionConfig, Schema};
use crate::validation::{relationship_id, validate, FieldError, Operation, ValidationErrors};

/// Largest page the repository hands out; used when walking every page
const PAGE_SIZE: u32 = 100;

/// Error types for collection service operations
#[derive(Debug, thiserror::Error)]
pub enum CollectionServiceError {
    /// The slug names no collection of the schema
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Document not found
    #[error("Document {id} not found in '{collection}'")]
    NotFound { collection: String, id: i64 },

    /// Input failed validation
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Write would break a uniqueness or reference constraint
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Service for reading and writing documents of any collection
pub struct CollectionService {
    schema: &'static Schema,
    repo: Arc<dyn DocumentRepository>,
}

impl CollectionService {
    /// Create a new collection service
    ///
    /// # Arguments
    /// * `schema` - Collections this service serves
    /// * `repo` - Document repository for database operations
    pub fn new(schema: &'static Schema, repo: Arc<dyn DocumentRepository>) -> Self {
        Self { schema, repo }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    fn collection(&self, slug: &str) -> Result<&'static CollectionConfig, CollectionServiceError> {
        self.schema
            .get(slug)
            .ok_or_else(|| CollectionServiceError::UnknownCollection(slug.to_string()))
    }

    /// Validate `input` and store it as a new document
    ///
    /// # Errors
    /// - `UnknownCollection` if `slug` is not declared
    /// - `Validation` if a field is invalid or a relationship target is missing
    /// - `Conflict` if a unique field or field group is already taken
    pub async fn create(
        &self,
        slug: &str,
        input: &Map<String, Value>,
    ) -> Result<Document, CollectionServiceError> {
        let collection = self.collection(slug)?;
        let data = validate(collection, input, Operation::Create)?;

        self.check_relationships(collection, &data).await?;
        self.check_unique(collection, &data, None).await?;

        let doc = self
            .repo
            .create(collection, &data)
            .await
            .map_err(|e| write_error(collection, e))?;

        tracing::info!(collection = %slug, id = doc.id, "Document created");
        Ok(doc)
    }

    /// Get a document by ID
    pub async fn find_by_id(
        &self,
        slug: &str,
        id: i64,
    ) -> Result<Option<Document>, CollectionServiceError> {
        let collection = self.collection(slug)?;
        self.repo
            .get_by_id(collection, id)
            .await
            .context("Failed to get document by ID")
            .map_err(Into::into)
    }

    /// List one page of documents
    ///
    /// # Errors
    /// - `Validation` if a filter or the sort names an unknown field
    pub async fn find(
        &self,
        slug: &str,
        params: &ListParams,
    ) -> Result<PagedResult<Document>, CollectionServiceError> {
        let collection = self.collection(slug)?;
        check_query_fields(collection, params)?;

        self.repo
            .list(collection, params)
            .await
            .context("Failed to list documents")
            .map_err(Into::into)
    }

    /// All documents matching `params`, across every page
    ///
    /// `params.page` and `params.per_page` are ignored.
    pub async fn find_all(
        &self,
        slug: &str,
        params: &ListParams,
    ) -> Result<Vec<Document>, CollectionServiceError> {
        let mut params = params.clone();
        params.per_page = PAGE_SIZE;
        params.page = 1;

        let mut docs = Vec::new();
        loop {
            let page = self.find(slug, &params).await?;
            let has_next = page.has_next();
            docs.extend(page.items);
            if !has_next {
                break;
            }
            params.page += 1;
        }
        Ok(docs)
    }

    /// Apply a partial update to a stored document
    ///
    /// Fields absent from `input` keep their stored value; read-only fields
    /// are never changed.
    ///
    /// # Errors
    /// - `NotFound` if the document doesn't exist
    /// - `Validation` / `Conflict` as for [`create`](Self::create)
    pub async fn update(
        &self,
        slug: &str,
        id: i64,
        input: &Map<String, Value>,
    ) -> Result<Document, CollectionServiceError> {
        let collection = self.collection(slug)?;
        let existing = self
            .repo
            .get_by_id(collection, id)
            .await
            .context("Failed to get document")?
            .ok_or_else(|| not_found(slug, id))?;

        let data = validate(
            collection,
            input,
            Operation::Update {
                existing: &existing.data,
            },
        )?;

        self.check_relationships(collection, &data).await?;
        self.check_unique(collection, &data, Some(id)).await?;

        let doc = self
            .repo
            .update(collection, id, &data)
            .await
            .map_err(|e| write_error(collection, e))?
            .ok_or_else(|| not_found(slug, id))?;

        tracing::info!(collection = %slug, id, "Document updated");
        Ok(doc)
    }

    /// Delete a document
    ///
    /// # Errors
    /// - `NotFound` if the document doesn't exist
    /// - `Conflict` if another document still references it
    pub async fn delete(&self, slug: &str, id: i64) -> Result<(), CollectionServiceError> {
        let collection = self.collection(slug)?;
        if !self
            .repo
            .exists(collection, id)
            .await
            .context("Failed to check document")?
        {
            return Err(not_found(slug, id));
        }

        for (referrer, field) in self.schema.references_to(slug) {
            let count = self
                .repo
                .count_where(referrer, &[(field.name.clone(), Value::from(id))])
                .await
                .context("Failed to count references")?;
            if count > 0 {
                tracing::warn!(
                    collection = %slug,
                    id,
                    referrer = %referrer.slug,
                    count,
                    "Delete refused, document is referenced"
                );
                return Err(CollectionServiceError::Conflict(format!(
                    "Document {} in '{}' is referenced by {} document(s) in '{}' ({})",
                    id, slug, count, referrer.slug, field.name
                )));
            }
        }

        self.repo
            .delete(collection, id)
            .await
            .map_err(|e| write_error(collection, e))?;

        tracing::info!(collection = %slug, id, "Document deleted");
        Ok(())
    }

    /// Every relationship id in `data` must name a stored document
    async fn check_relationships(
        &self,
        collection: &CollectionConfig,
        data: &Map<String, Value>,
    ) -> Result<(), CollectionServiceError> {
        let mut errors = ValidationErrors::default();

        for field in collection.all_fields() {
            let Some(target_slug) = field.field_type.relation_to() else {
                continue;
            };
            let Some(id) = data.get(&field.name).and_then(relationship_id) else {
                continue;
            };
            let target = self.collection(target_slug)?;
            let exists = self
                .repo
                .exists(target, id)
                .await
                .context("Failed to check relationship target")?;
            if !exists {
                errors.push(FieldError::new(
                    field.name.clone(),
                    format!("Document {} does not exist in '{}'.", id, target_slug),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    /// Unique fields and unique groups must not match another stored document
    async fn check_unique(
        &self,
        collection: &CollectionConfig,
        data: &Map<String, Value>,
        own_id: Option<i64>,
    ) -> Result<(), CollectionServiceError> {
        let mut groups: Vec<Vec<String>> = collection
            .all_fields()
            .into_iter()
            .filter(|f| f.unique)
            .map(|f| vec![f.name])
            .collect();
        groups.extend(collection.unique_together.iter().cloned());

        for group in groups {
            let mut params = ListParams::new(1, 2);
            let mut complete = true;
            for name in &group {
                match data.get(name) {
                    Some(value) if !value.is_null() => {
                        params = params.filter(name.clone(), value.clone());
                    }
                    _ => complete = false,
                }
            }
            // NULLs never collide under a unique index
            if !complete {
                continue;
            }

            let page = self
                .repo
                .list(collection, &params)
                .await
                .context("Failed to check uniqueness")?;
            if page.items.iter().any(|doc| Some(doc.id) != own_id) {
                return Err(CollectionServiceError::Conflict(format!(
                    "A document in '{}' with the same {} already exists",
                    collection.slug,
                    group.join(" + ")
                )));
            }
        }

        Ok(())
    }
}

fn not_found(slug: &str, id: i64) -> CollectionServiceError {
    CollectionServiceError::NotFound {
        collection: slug.to_string(),
        id,
    }
}

/// Constraint failures raised by the database become conflicts
fn write_error(collection: &CollectionConfig, err: anyhow::Error) -> CollectionServiceError {
    if is_unique_violation(&err) {
        CollectionServiceError::Conflict(format!(
            "A document in '{}' with the same unique values already exists",
            collection.slug
        ))
    } else if is_foreign_key_violation(&err) {
        CollectionServiceError::Conflict(format!(
            "Write to '{}' breaks a document reference",
            collection.slug
        ))
    } else {
        CollectionServiceError::InternalError(err)
    }
}

fn check_query_fields(
    collection: &CollectionConfig,
    params: &ListParams,
) -> Result<(), ValidationErrors> {
    let fields = collection.all_fields();
    let known = |name: &str| name == "id" || fields.iter().any(|f| f.name == name);

    let mut errors = ValidationErrors::default();
    for (name, _) in &params.filters {
        if !known(name) {
            errors.push(FieldError::new(name.clone(), "Unknown field."));
        }
    }
    if let Some(sort) = &params.sort {
        if !known(&sort.field) {
            errors.push(FieldError::new(sort.field.clone(), "Unknown field."));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
