//! Data models
//!
//! - `Document`: a stored record of any collection, as validated JSON
//! - typed views of the LMS collections (`User`, `Course`, `Lesson`,
//!   `Enrollment`, `Media`) and their create inputs
//! - list/pagination types

mod course;
mod document;
mod enrollment;
mod lesson;
mod media;
mod user;

pub use course::{Course, CreateCourseInput};
pub use document::{Document, ListParams, PagedResult, SortOrder};
pub use enrollment::{Enrollment, EnrollmentStatus};
pub use lesson::{CreateLessonInput, Lesson};
pub use media::{CreateMediaInput, Media};
pub use user::{CreateUserInput, User, UserRole};

use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize a create input into the JSON object the collection service takes
pub(crate) fn to_input<T: Serialize>(input: &T) -> anyhow::Result<Map<String, Value>> {
    match serde_json::to_value(input)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Expected an object, got {}", other),
    }
}
