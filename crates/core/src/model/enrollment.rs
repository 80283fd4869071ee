use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, EnrollmentId, StudentId};
use crate::rollup::CourseProgress;

/// A student's membership in a course, carrying the latest rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    /// Overall course progress in percent.
    pub progress: u32,
    pub completed: bool,
}

impl Enrollment {
    #[must_use]
    pub fn new(student_id: StudentId, course_id: CourseId, enrolled_at: DateTime<Utc>) -> Self {
        Self {
            id: EnrollmentId::new(),
            student_id,
            course_id,
            enrolled_at,
            progress: 0,
            completed: false,
        }
    }

    /// Copy the rollup onto the enrollment. Returns `true` if anything changed.
    pub fn apply_rollup(&mut self, rollup: &CourseProgress) -> bool {
        let completed = rollup.total_items > 0 && rollup.overall_progress >= 100;
        if self.progress == rollup.overall_progress && self.completed == completed {
            return false;
        }
        self.progress = rollup.overall_progress;
        self.completed = completed;
        true
    }
}
