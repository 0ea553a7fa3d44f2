//! Database layer
//!
//! SQLite persistence for the collections:
//! - `pool`: connection pool behind the `DatabasePool` trait
//! - `sync`: table creation derived from the collection schema
//! - `repositories`: generic document storage
//!
//! # Usage
//!
//! ```ignore
//! use pi_lms::config::DatabaseConfig;
//! use pi_lms::db::{create_pool, sync};
//! use pi_lms::schema::lms_schema;
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! sync::sync_schema(&pool, lms_schema()).await?;
//! pool.ping().await?;
//! ```

pub mod pool;
pub mod repositories;
pub mod sync;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, SqliteDatabase};
