//! Aggregation over progress records.
//!
//! Everything here is a pure function of its inputs. Callers pass `now`
//! explicitly; nothing reads a clock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::progress::percent_of;
use crate::model::{CourseId, ItemType, ProgressRecord, ProgressStatus, StudentId};
use crate::time::days_after;

//
// ─── COUNTS ────────────────────────────────────────────────────────────────────
//

/// Record counts broken down by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub not_started: u32,
    pub overdue: u32,
}

impl StatusCounts {
    fn record(&mut self, status: ProgressStatus) {
        self.total = self.total.saturating_add(1);
        let slot = match status {
            ProgressStatus::Completed => &mut self.completed,
            ProgressStatus::InProgress => &mut self.in_progress,
            ProgressStatus::NotStarted => &mut self.not_started,
            ProgressStatus::Overdue => &mut self.overdue,
        };
        *slot = slot.saturating_add(1);
    }
}

//
// ─── COURSE PROGRESS ───────────────────────────────────────────────────────────
//

/// One student's rollup for one course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub total_items: u32,
    pub completed_items: u32,
    pub in_progress_items: u32,
    pub not_started_items: u32,
    pub overdue_items: u32,
    pub total_time_spent: u64,
    pub total_score: f64,
    pub total_max_score: f64,
    /// Completed items as a rounded percentage of all items; 0 for an empty course.
    pub overall_progress: u32,
    /// Rounded `total_score / total_max_score`; 0 when nothing is scored.
    pub average_score: u32,
    pub by_type: BTreeMap<ItemType, StatusCounts>,
}

/// Roll up a student's records for one course.
///
/// Only records carrying both `score` and `max_score` feed the score totals.
#[must_use]
pub fn compute_course_progress(
    student_id: StudentId,
    course_id: CourseId,
    records: &[ProgressRecord],
) -> CourseProgress {
    let mut totals = StatusCounts::default();
    let mut by_type: BTreeMap<ItemType, StatusCounts> = BTreeMap::new();
    let mut total_time_spent = 0_u64;
    let mut total_score = 0.0_f64;
    let mut total_max_score = 0.0_f64;

    for record in records {
        totals.record(record.status());
        by_type
            .entry(record.item_type())
            .or_default()
            .record(record.status());

        total_time_spent += u64::from(record.time_spent_minutes());

        if let (Some(score), Some(max)) = (record.score(), record.max_score()) {
            total_score += score;
            total_max_score += max;
        }
    }

    let overall_progress = if totals.total == 0 {
        0
    } else {
        percent_of(f64::from(totals.completed), f64::from(totals.total))
    };

    let average_score = if total_max_score > 0.0 {
        percent_of(total_score, total_max_score)
    } else {
        0
    };

    CourseProgress {
        student_id,
        course_id,
        total_items: totals.total,
        completed_items: totals.completed,
        in_progress_items: totals.in_progress,
        not_started_items: totals.not_started,
        overdue_items: totals.overdue,
        total_time_spent,
        total_score,
        total_max_score,
        overall_progress,
        average_score,
        by_type,
    }
}

//
// ─── DEADLINES ─────────────────────────────────────────────────────────────────
//

/// Incomplete records whose due date has passed, earliest first.
#[must_use]
pub fn compute_overdue_items(records: &[ProgressRecord], now: DateTime<Utc>) -> Vec<&ProgressRecord> {
    let mut overdue: Vec<&ProgressRecord> = records
        .iter()
        .filter(|r| !r.status().is_completed())
        .filter(|r| r.due_date().is_some_and(|due| due < now))
        .collect();
    overdue.sort_by_key(|r| r.due_date());
    overdue
}

/// Incomplete records due within `[now, now + window_days]`, earliest first.
///
/// A window reaching past the last representable date covers everything due
/// from `now` on.
#[must_use]
pub fn compute_upcoming_deadlines(
    records: &[ProgressRecord],
    now: DateTime<Utc>,
    window_days: u32,
) -> Vec<&ProgressRecord> {
    let horizon = days_after(now, i64::from(window_days)).unwrap_or(DateTime::<Utc>::MAX_UTC);
    let mut upcoming: Vec<&ProgressRecord> = records
        .iter()
        .filter(|r| !r.status().is_completed())
        .filter(|r| r.due_date().is_some_and(|due| due >= now && due <= horizon))
        .collect();
    upcoming.sort_by_key(|r| r.due_date());
    upcoming
}

//
// ─── COURSE STATISTICS ─────────────────────────────────────────────────────────
//

/// Cross-student statistics for one course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CourseStatistics {
    pub total_students: u32,
    pub completed_students: u32,
    pub average_progress: u32,
    pub completion_rate: u32,
}

#[must_use]
pub fn compute_course_statistics(summaries: &[CourseProgress]) -> CourseStatistics {
    if summaries.is_empty() {
        return CourseStatistics::default();
    }

    let total_students = u32::try_from(summaries.len()).unwrap_or(u32::MAX);
    let completed_students = u32::try_from(
        summaries
            .iter()
            .filter(|s| s.overall_progress == 100)
            .count(),
    )
    .unwrap_or(u32::MAX);
    let progress_sum: f64 = summaries
        .iter()
        .map(|s| f64::from(s.overall_progress))
        .sum();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let average_progress = (progress_sum / f64::from(total_students)).round() as u32;

    CourseStatistics {
        total_students,
        completed_students,
        average_progress,
        completion_rate: percent_of(f64::from(completed_students), f64::from(total_students)),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
