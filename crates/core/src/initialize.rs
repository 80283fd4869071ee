//! Seeding progress records for a newly enrolled student.

use chrono::{DateTime, Utc};

use crate::model::{CourseItems, ProgressRecord, StudentId, TrackedItem};

/// Build one `not_started` record per module, assignment and quiz.
///
/// Assignments copy their due date and max score; quizzes use the sum of
/// their question points as max score. The course id comes from `items`.
#[must_use]
pub fn initial_records(
    student_id: StudentId,
    items: &CourseItems,
    now: DateTime<Utc>,
) -> Vec<ProgressRecord> {
    let course_id = items.course_id;
    let mut records = Vec::with_capacity(items.item_count());

    for module in &items.modules {
        records.push(ProgressRecord::new(
            student_id,
            course_id,
            TrackedItem::Module {
                module_id: module.id,
            },
            now,
        ));
    }

    for assignment in &items.assignments {
        records.push(
            ProgressRecord::new(
                student_id,
                course_id,
                TrackedItem::Assignment {
                    assignment_id: assignment.id,
                },
                now,
            )
            .with_due_date(assignment.due_date)
            .with_max_score(assignment.max_score),
        );
    }

    for quiz in &items.quizzes {
        records.push(
            ProgressRecord::new(
                student_id,
                course_id,
                TrackedItem::Quiz { quiz_id: quiz.id },
                now,
            )
            .with_max_score(Some(quiz.total_points())),
        );
    }

    records
}
