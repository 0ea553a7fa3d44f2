//! Document repository
//!
//! Database operations for collection documents.
//!
//! This module provides:
//! - `DocumentRepository` trait defining the interface for document access
//! - `SqlxDocumentRepository` implementing it for SQLite, with SQL built from
//!   the collection's field declarations
//!
//! Documents go in and come out as validated JSON objects keyed by field
//! name; column names, value encoding and rich-text serialization are handled
//! here.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{query::Query, Row, Sqlite};
use std::sync::Arc;

use crate::db::sync::table_name;
use crate::db::DynDatabasePool;
use crate::models::{Document, ListParams, PagedResult};
use crate::schema::{CollectionConfig, Field, FieldType};
use crate::validation::{format_date, parse_date, relationship_id};

/// Document repository trait
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a validated document
    async fn create(&self, collection: &CollectionConfig, data: &Map<String, Value>)
        -> Result<Document>;

    /// Get document by ID
    async fn get_by_id(&self, collection: &CollectionConfig, id: i64) -> Result<Option<Document>>;

    /// List documents with filters, sorting and pagination
    async fn list(
        &self,
        collection: &CollectionConfig,
        params: &ListParams,
    ) -> Result<PagedResult<Document>>;

    /// Overwrite the fields present in `data`; `None` if the document doesn't exist
    async fn update(
        &self,
        collection: &CollectionConfig,
        id: i64,
        data: &Map<String, Value>,
    ) -> Result<Option<Document>>;

    /// Delete a document; returns whether a row was removed
    async fn delete(&self, collection: &CollectionConfig, id: i64) -> Result<bool>;

    /// Check if a document exists
    async fn exists(&self, collection: &CollectionConfig, id: i64) -> Result<bool>;

    /// Count documents matching equality filters
    async fn count_where(
        &self,
        collection: &CollectionConfig,
        filters: &[(String, Value)],
    ) -> Result<i64>;
}

/// SQLx-based document repository
pub struct SqlxDocumentRepository {
    pool: DynDatabasePool,
}

impl SqlxDocumentRepository {
    /// Create a new SQLx document repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DocumentRepository> {
        Arc::new(Self::new(pool))
    }
}

/// A value ready to be bound to a SQLite statement
#[derive(Debug, Clone, PartialEq)]
enum SqlValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

fn to_sql_value(field: &Field, value: &Value) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    let invalid = || anyhow!("Invalid value for {} field '{}'", field.field_type.kind(), field.name);

    Ok(match &field.field_type {
        FieldType::Text
        | FieldType::Textarea
        | FieldType::Email
        | FieldType::Select { .. } => SqlValue::Text(value.as_str().ok_or_else(invalid)?.to_string()),
        FieldType::Number => SqlValue::Real(value.as_f64().ok_or_else(invalid)?),
        FieldType::Checkbox => SqlValue::Bool(value.as_bool().ok_or_else(invalid)?),
        FieldType::Date => {
            SqlValue::Timestamp(value.as_str().and_then(parse_date).ok_or_else(invalid)?)
        }
        FieldType::Relationship { .. } | FieldType::Upload { .. } => {
            SqlValue::Integer(relationship_id(value).ok_or_else(invalid)?)
        }
        FieldType::RichText { .. } => SqlValue::Text(value.to_string()),
    })
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Integer(i) => query.bind(*i),
        SqlValue::Real(f) => query.bind(*f),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Timestamp(t) => query.bind(*t),
    }
}

fn read_field(row: &SqliteRow, field: &Field) -> Result<Value> {
    let column = field.column_name();
    let ctx = || format!("Failed to read column '{}'", column);

    let value = match &field.field_type {
        FieldType::Text | FieldType::Textarea | FieldType::Email | FieldType::Select { .. } => row
            .try_get::<Option<String>, _>(column.as_str())
            .with_context(ctx)?
            .map(Value::from),
        FieldType::Number => row
            .try_get::<Option<f64>, _>(column.as_str())
            .with_context(ctx)?
            .map(number_value),
        FieldType::Checkbox => row
            .try_get::<Option<bool>, _>(column.as_str())
            .with_context(ctx)?
            .map(Value::from),
        FieldType::Date => row
            .try_get::<Option<DateTime<Utc>>, _>(column.as_str())
            .with_context(ctx)?
            .map(|d| Value::from(format_date(d))),
        FieldType::Relationship { .. } | FieldType::Upload { .. } => row
            .try_get::<Option<i64>, _>(column.as_str())
            .with_context(ctx)?
            .map(Value::from),
        FieldType::RichText { .. } => match row
            .try_get::<Option<String>, _>(column.as_str())
            .with_context(ctx)?
        {
            Some(raw) => Some(serde_json::from_str(&raw).with_context(ctx)?),
            None => None,
        },
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Whole numbers come back as integers, everything else as floats
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn row_to_document(collection: &CollectionConfig, fields: &[Field], row: &SqliteRow) -> Result<Document> {
    let id: i64 = row.try_get("id").context("Failed to read id")?;
    let mut data = Map::new();
    for field in fields {
        data.insert(field.name.clone(), read_field(row, field)?);
    }
    Ok(Document::new(id, collection.slug.clone(), data))
}

/// Build `WHERE ...` for equality filters; returns the clause and its bind values
fn build_where(
    collection: &CollectionConfig,
    fields: &[Field],
    filters: &[(String, Value)],
) -> Result<(String, Vec<SqlValue>)> {
    if filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut clauses = Vec::with_capacity(filters.len());
    let mut values = Vec::new();
    for (name, value) in filters {
        if name == "id" {
            let id = value
                .as_i64()
                .ok_or_else(|| anyhow!("Invalid id filter: {}", value))?;
            clauses.push("id = ?".to_string());
            values.push(SqlValue::Integer(id));
            continue;
        }

        let field = fields
            .iter()
            .find(|f| &f.name == name)
            .ok_or_else(|| anyhow!("Unknown field '{}' in '{}'", name, collection.slug))?;
        match to_sql_value(field, value)? {
            SqlValue::Null => clauses.push(format!("{} IS NULL", field.column_name())),
            v => {
                clauses.push(format!("{} = ?", field.column_name()));
                values.push(v);
            }
        }
    }

    Ok((format!(" WHERE {}", clauses.join(" AND ")), values))
}

#[async_trait]
impl DocumentRepository for SqlxDocumentRepository {
    async fn create(
        &self,
        collection: &CollectionConfig,
        data: &Map<String, Value>,
    ) -> Result<Document> {
        let table = table_name(collection);
        let fields = collection.all_fields();

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in &fields {
            if let Some(value) = data.get(&field.name) {
                columns.push(field.column_name());
                values.push(to_sql_value(field, value)?);
            }
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        };

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = bind_value(query, value);
        }
        let result = query
            .execute(self.pool.sqlite())
            .await
            .with_context(|| format!("Failed to create document in '{}'", collection.slug))?;

        let id = result.last_insert_rowid();
        tracing::debug!(collection = %collection.slug, id, "Document created");

        self.get_by_id(collection, id)
            .await?
            .ok_or_else(|| anyhow!("Created document {} in '{}' vanished", id, collection.slug))
    }

    async fn get_by_id(&self, collection: &CollectionConfig, id: i64) -> Result<Option<Document>> {
        let fields = collection.all_fields();
        let row = sqlx::query(&format!("SELECT * FROM {} WHERE id = ?", table_name(collection)))
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get document by ID")?;

        match row {
            Some(row) => Ok(Some(row_to_document(collection, &fields, &row)?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        collection: &CollectionConfig,
        params: &ListParams,
    ) -> Result<PagedResult<Document>> {
        let table = table_name(collection);
        let fields = collection.all_fields();
        let (where_clause, values) = build_where(collection, &fields, &params.filters)?;

        let order_by = match &params.sort {
            Some(sort) => {
                let column = if sort.field == "id" {
                    "id".to_string()
                } else {
                    fields
                        .iter()
                        .find(|f| f.name == sort.field)
                        .map(Field::column_name)
                        .ok_or_else(|| {
                            anyhow!("Cannot sort '{}' by unknown field '{}'", collection.slug, sort.field)
                        })?
                };
                let dir = if sort.descending { "DESC" } else { "ASC" };
                format!("{column} {dir}, id {dir}")
            }
            None => "id ASC".to_string(),
        };

        let count_sql = format!("SELECT COUNT(*) FROM {}{}", table, where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for value in &values {
            count_query = bind_value(count_query, value);
        }
        let total: i64 = count_query
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count documents")?
            .get(0);

        let list_sql = format!(
            "SELECT * FROM {}{} ORDER BY {} LIMIT ? OFFSET ?",
            table, where_clause, order_by
        );
        let mut list_query = sqlx::query(&list_sql);
        for value in &values {
            list_query = bind_value(list_query, value);
        }
        let rows = list_query
            .bind(params.per_page() as i64)
            .bind(params.offset() as i64)
            .fetch_all(self.pool.sqlite())
            .await
            .with_context(|| format!("Failed to list '{}'", collection.slug))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(row_to_document(collection, &fields, row)?);
        }

        Ok(PagedResult::new(items, total, params))
    }

    async fn update(
        &self,
        collection: &CollectionConfig,
        id: i64,
        data: &Map<String, Value>,
    ) -> Result<Option<Document>> {
        let fields = collection.all_fields();

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for field in &fields {
            if let Some(value) = data.get(&field.name) {
                assignments.push(format!("{} = ?", field.column_name()));
                values.push(to_sql_value(field, value)?);
            }
        }

        if assignments.is_empty() {
            return self.get_by_id(collection, id).await;
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            table_name(collection),
            assignments.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for value in &values {
            query = bind_value(query, value);
        }
        let result = query
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .with_context(|| format!("Failed to update document {} in '{}'", id, collection.slug))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(collection, id).await
    }

    async fn delete(&self, collection: &CollectionConfig, id: i64) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table_name(collection)))
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .with_context(|| format!("Failed to delete document {} in '{}'", id, collection.slug))?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, collection: &CollectionConfig, id: i64) -> Result<bool> {
        let row = sqlx::query(&format!("SELECT 1 FROM {} WHERE id = ?", table_name(collection)))
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to check document existence")?;
        Ok(row.is_some())
    }

    async fn count_where(
        &self,
        collection: &CollectionConfig,
        filters: &[(String, Value)],
    ) -> Result<i64> {
        let fields = collection.all_fields();
        let (where_clause, values) = build_where(collection, &fields, filters)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", table_name(collection), where_clause);
        let mut query = sqlx::query(&sql);
        for value in &values {
            query = bind_value(query, value);
        }
        let count: i64 = query
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count documents")?
            .get(0);
        Ok(count)
    }
}
