//! Schema-driven table setup
//!
//! Derives one table per collection from its field declarations and creates
//! it if missing, together with the unique and foreign-key indexes. Existing
//! tables are left alone; a column the declarations expect but the table lacks
//! is reported with a warning. There is no versioned migration history.

use anyhow::{Context, Result};
use sqlx::Row;
use std::collections::HashSet;

use super::DynDatabasePool;
use crate::schema::{to_snake_case, CollectionConfig, Field, FieldType, Schema};

/// Table backing a collection
pub fn table_name(collection: &CollectionConfig) -> String {
    to_snake_case(&collection.slug)
}

fn column_type(field: &Field) -> &'static str {
    match field.field_type {
        FieldType::Text
        | FieldType::Textarea
        | FieldType::Email
        | FieldType::Select { .. }
        | FieldType::RichText { .. } => "TEXT",
        FieldType::Number => "REAL",
        FieldType::Checkbox => "BOOLEAN",
        FieldType::Date => "TIMESTAMP",
        FieldType::Relationship { .. } | FieldType::Upload { .. } => "INTEGER",
    }
}

/// `CREATE TABLE` / `CREATE INDEX` statements for one collection
///
/// Fails if a `unique_together` group names a field the collection lacks.
pub fn collection_ddl(collection: &CollectionConfig) -> Result<Vec<String>> {
    let table = table_name(collection);
    let fields = collection.all_fields();

    let mut columns = vec!["    id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for field in &fields {
        let mut column = format!("    {} {}", field.column_name(), column_type(field));
        if field.required {
            column.push_str(" NOT NULL");
        }
        if let Some(target) = field.field_type.relation_to() {
            column.push_str(&format!(
                " REFERENCES {}(id) ON DELETE RESTRICT",
                to_snake_case(target)
            ));
        }
        columns.push(column);
    }

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        table,
        columns.join(",\n")
    )];

    for field in &fields {
        let column = field.column_name();
        if field.unique {
            statements.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_{table}_{column} ON {table}({column})"
            ));
        } else if field.field_type.relation_to().is_some() {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table}({column})"
            ));
        }
    }

    for group in &collection.unique_together {
        let columns = group
            .iter()
            .map(|name| {
                fields
                    .iter()
                    .find(|f| &f.name == name)
                    .map(Field::column_name)
                    .with_context(|| {
                        format!("Unique constraint on {} names unknown field {}", table, name)
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        statements.push(format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_{}_{} ON {}({})",
            table,
            columns.join("_"),
            table,
            columns.join(", ")
        ));
    }

    Ok(statements)
}

/// Create the tables of every collection in `schema`
pub async fn sync_schema(pool: &DynDatabasePool, schema: &Schema) -> Result<()> {
    schema.check().context("Collection schema is inconsistent")?;

    let mut tx = pool
        .sqlite()
        .begin()
        .await
        .context("Failed to start schema transaction")?;

    for collection in schema.collections() {
        for statement in collection_ddl(collection)? {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to apply: {}", statement))?;
        }
    }

    tx.commit().await.context("Failed to commit schema")?;

    for collection in schema.collections() {
        let missing = missing_columns(pool, collection).await?;
        if !missing.is_empty() {
            tracing::warn!(
                collection = %collection.slug,
                columns = ?missing,
                "Table exists but lacks declared columns"
            );
        }
    }

    tracing::info!(collections = schema.collections().len(), "Schema synced");
    Ok(())
}

/// Declared columns absent from the live table
pub async fn missing_columns(
    pool: &DynDatabasePool,
    collection: &CollectionConfig,
) -> Result<Vec<String>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table_name(collection)))
        .fetch_all(pool.sqlite())
        .await
        .context("Failed to read table info")?;

    let existing: HashSet<String> = rows
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    Ok(collection
        .all_fields()
        .iter()
        .map(Field::column_name)
        .filter(|c| !existing.contains(c))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::schema::{lessons, lms_schema, users};

    #[test]
    fn test_lessons_ddl() {
        let ddl = collection_ddl(&lessons()).unwrap();
        let table = &ddl[0];
        assert!(table.starts_with("CREATE TABLE IF NOT EXISTS lessons"));
        assert!(table.contains("title TEXT NOT NULL"));
        assert!(table.contains("content TEXT NOT NULL"));
        assert!(table.contains("published BOOLEAN,"));
        assert!(table.contains("course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE RESTRICT"));
        assert!(table.contains("created_at TIMESTAMP,"));
        assert!(table.contains("updated_at TIMESTAMP NOT NULL"));
        assert!(ddl
            .iter()
            .any(|s| s.contains("idx_lessons_course_id ON lessons(course_id)")));
    }

    #[test]
    fn test_users_email_unique_index() {
        let ddl = collection_ddl(&users()).unwrap();
        assert!(ddl[0].contains("email TEXT NOT NULL"));
        assert!(ddl
            .iter()
            .any(|s| s == "CREATE UNIQUE INDEX IF NOT EXISTS uq_users_email ON users(email)"));
    }

    #[test]
    fn test_unique_together_index() {
        let ddl = collection_ddl(&crate::schema::enrollments()).unwrap();
        assert!(ddl.iter().any(|s| s.contains(
            "uq_enrollments_user_id_course_id ON enrollments(user_id, course_id)"
        )));
    }

    #[test]
    fn test_unique_together_unknown_field_fails() {
        let collection = CollectionConfig::new("tags")
            .fields(vec![Field::new("name", FieldType::Text)])
            .unique_together(&["name", "colour"]);

        let err = collection_ddl(&collection).unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[tokio::test]
    async fn test_sync_schema_is_idempotent() {
        let pool = create_test_pool().await.unwrap();
        sync_schema(&pool, lms_schema()).await.unwrap();
        sync_schema(&pool, lms_schema()).await.unwrap();

        for collection in lms_schema().collections() {
            let missing = missing_columns(&pool, collection).await.unwrap();
            assert!(missing.is_empty(), "{} missing {:?}", collection.slug, missing);
        }
    }

    #[tokio::test]
    async fn test_missing_columns_reported() {
        let pool = create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE lessons (id INTEGER PRIMARY KEY, title TEXT)")
            .await
            .unwrap();
        let missing = missing_columns(&pool, &lessons()).await.unwrap();
        assert!(missing.contains(&"course_id".to_string()));
        assert!(!missing.contains(&"title".to_string()));
    }
}
