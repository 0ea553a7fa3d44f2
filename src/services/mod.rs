//! Services layer - Business logic
//!
//! Services sit between the schema-driven repository and callers:
//! - `CollectionService` validates and persists documents of any collection,
//!   enforcing relationships and uniqueness
//! - `UserService`, `LessonService` and `EnrollmentService` are typed views
//!   over it for the LMS collections

pub mod collection;
pub mod enrollment;
pub mod lesson;
pub mod user;

pub use collection::{CollectionService, CollectionServiceError};
pub use enrollment::EnrollmentService;
pub use lesson::LessonService;
pub use user::UserService;
