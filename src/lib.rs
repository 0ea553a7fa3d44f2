//! pi-lms - Content backend for a small learning-management system
//!
//! The collections (users, media, courses, lessons, enrollments) are declared
//! as data in [`schema`]; the rest of the crate makes those declarations
//! executable: validation, SQLite persistence, typed services, a CORS-guarded
//! HTTP surface and TypeScript type generation.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod richtext;
pub mod schema;
pub mod services;
pub mod typegen;
pub mod validation;
