use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{AssignmentId, CourseId, ModuleId, QuizId};

/// A course module as seen by progress tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: ModuleId,
    pub title: String,
    pub order: u32,
}

/// A gradable assignment with an optional deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseAssignment {
    pub id: AssignmentId,
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub max_score: Option<f64>,
}

/// A quiz; its maximum score is the sum of its question points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseQuiz {
    pub id: QuizId,
    pub title: String,
    pub question_points: Vec<f64>,
}

impl CourseQuiz {
    #[must_use]
    pub fn total_points(&self) -> f64 {
        self.question_points.iter().sum()
    }
}

/// Snapshot of everything trackable in a course, fetched from the course
/// collaborator at the time a student's progress is initialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseItems {
    pub course_id: CourseId,
    pub title: String,
    pub modules: Vec<CourseModule>,
    pub assignments: Vec<CourseAssignment>,
    pub quizzes: Vec<CourseQuiz>,
}

impl CourseItems {
    #[must_use]
    pub fn empty(course_id: CourseId, title: impl Into<String>) -> Self {
        Self {
            course_id,
            title: title.into(),
            modules: Vec::new(),
            assignments: Vec::new(),
            quizzes: Vec::new(),
        }
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.modules.len() + self.assignments.len() + self.quizzes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_total_sums_question_points() {
        let quiz = CourseQuiz {
            id: QuizId::new(),
            title: "Checkpoint".into(),
            question_points: vec![2.0, 3.0, 5.0],
        };
        assert!((quiz.total_points() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_course_has_no_items() {
        let items = CourseItems::empty(CourseId::new(), "Intro");
        assert_eq!(items.item_count(), 0);
    }
}
