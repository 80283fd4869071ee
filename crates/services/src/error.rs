//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::model::{CourseId, ProgressId, StudentId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("progress record {0} not found")]
    RecordNotFound(ProgressId),
    #[error("student {student_id} has no progress record for that item of course {course_id}")]
    ItemNotFound {
        student_id: StudentId,
        course_id: CourseId,
    },
    #[error("student {student_id} is not enrolled in course {course_id}")]
    NotEnrolled {
        student_id: StudentId,
        course_id: CourseId,
    },
    #[error("student {student_id} is already enrolled in course {course_id}")]
    AlreadyEnrolled {
        student_id: StudentId,
        course_id: CourseId,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
