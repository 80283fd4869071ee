mod course;
mod enrollment;
mod ids;
pub(crate) mod progress;

pub use course::{CourseAssignment, CourseItems, CourseModule, CourseQuiz};
pub use enrollment::Enrollment;
pub use ids::{
    AssignmentId, CourseId, EnrollmentId, ModuleId, ParseIdError, ProgressId, QuizId, StudentId,
};
pub use progress::{
    ContentKind, ItemType, PersistedProgress, ProgressError, ProgressRecord, ProgressStatus,
    ProgressSummary, TrackedItem,
};
