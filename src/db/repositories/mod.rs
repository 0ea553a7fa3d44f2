//! Database repositories
//!
//! Every collection is stored through the same schema-driven repository.

pub mod document;

pub use document::{DocumentRepository, SqlxDocumentRepository};

/// True if `err` wraps a SQLite UNIQUE constraint failure
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// True if `err` wraps a SQLite FOREIGN KEY constraint failure
pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}
