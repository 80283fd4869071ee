use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{AssignmentId, CourseId, ModuleId, ProgressId, QuizId, StudentId};

const SECONDS_PER_DAY: i64 = 86_400;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress percentage out of range: {0}")]
    PercentageOutOfRange(u8),

    #[error("completed record must be at 100% with completed_at set")]
    IncompleteCompletion,

    #[error("not started record cannot carry started_at")]
    StartedBeforeStart,
}

//
// ─── ITEM TYPE ─────────────────────────────────────────────────────────────────
//

/// Kind of trackable course item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Module,
    Assignment,
    Quiz,
    Video,
    Pdf,
    Reading,
}

impl ItemType {
    /// Storage and wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Module => "module",
            ItemType::Assignment => "assignment",
            ItemType::Quiz => "quiz",
            ItemType::Video => "video",
            ItemType::Pdf => "pdf",
            ItemType::Reading => "reading",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standalone content that is tracked without a backing course entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Video,
    Pdf,
    Reading,
}

impl From<ContentKind> for ItemType {
    fn from(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Video => ItemType::Video,
            ContentKind::Pdf => ItemType::Pdf,
            ContentKind::Reading => ItemType::Reading,
        }
    }
}

//
// ─── TRACKED ITEM ──────────────────────────────────────────────────────────────
//

/// The course item a progress record is about.
///
/// Exactly one backing entity is referenced for modules, assignments and
/// quizzes. Standalone content carries a caller-chosen `reference` (file id,
/// URL, slug) so that several readings in one course stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackedItem {
    Module { module_id: ModuleId },
    Assignment { assignment_id: AssignmentId },
    Quiz { quiz_id: QuizId },
    Content { content: ContentKind, reference: String },
}

impl TrackedItem {
    #[must_use]
    pub fn item_type(&self) -> ItemType {
        match self {
            TrackedItem::Module { .. } => ItemType::Module,
            TrackedItem::Assignment { .. } => ItemType::Assignment,
            TrackedItem::Quiz { .. } => ItemType::Quiz,
            TrackedItem::Content { content, .. } => (*content).into(),
        }
    }

    /// Discriminator used for the per-student uniqueness rule.
    #[must_use]
    pub fn item_key(&self) -> String {
        match self {
            TrackedItem::Module { module_id } => module_id.to_string(),
            TrackedItem::Assignment { assignment_id } => assignment_id.to_string(),
            TrackedItem::Quiz { quiz_id } => quiz_id.to_string(),
            TrackedItem::Content { reference, .. } => reference.clone(),
        }
    }

    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        match self {
            TrackedItem::Module { module_id } => Some(*module_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn assignment_id(&self) -> Option<AssignmentId> {
        match self {
            TrackedItem::Assignment { assignment_id } => Some(*assignment_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn quiz_id(&self) -> Option<QuizId> {
        match self {
            TrackedItem::Quiz { quiz_id } => Some(*quiz_id),
            _ => None,
        }
    }
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Primary state of a progress record.
///
/// `Overdue` overrides `NotStarted`/`InProgress` once the due date has passed
/// and is never reachable from `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
    Overdue,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Overdue => "overdue",
        }
    }

    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, ProgressStatus::Completed)
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── PERSISTED SHAPE ───────────────────────────────────────────────────────────
//

/// Raw field set used to rehydrate a record from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedProgress {
    pub id: ProgressId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub item: TrackedItem,
    pub status: ProgressStatus,
    pub progress_percentage: u8,
    pub time_spent_minutes: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//
// ─── PROGRESS RECORD ───────────────────────────────────────────────────────────
//

/// A student's state against one trackable course item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressRecord {
    id: ProgressId,
    student_id: StudentId,
    course_id: CourseId,
    item: TrackedItem,
    item_type: ItemType,
    status: ProgressStatus,
    progress_percentage: u8,
    time_spent_minutes: u32,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    last_accessed: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    score: Option<f64>,
    max_score: Option<f64>,
    metadata: Map<String, Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Creates a fresh `not_started` record.
    #[must_use]
    pub fn new(
        student_id: StudentId,
        course_id: CourseId,
        item: TrackedItem,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProgressId::new(),
            student_id,
            course_id,
            item_type: item.item_type(),
            item,
            status: ProgressStatus::NotStarted,
            progress_percentage: 0,
            time_spent_minutes: 0,
            started_at: None,
            completed_at: None,
            last_accessed: None,
            due_date: None,
            score: None,
            max_score: None,
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_due_date(mut self, due_date: Option<DateTime<Utc>>) -> Self {
        self.due_date = due_date;
        self
    }

    /// Negative maxima are treated as zero.
    #[must_use]
    pub fn with_max_score(mut self, max_score: Option<f64>) -> Self {
        self.max_score = max_score.map(|m| m.max(0.0));
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the stored fields violate the record invariants.
    pub fn from_persisted(p: PersistedProgress) -> Result<Self, ProgressError> {
        if p.progress_percentage > 100 {
            return Err(ProgressError::PercentageOutOfRange(p.progress_percentage));
        }
        if p.status == ProgressStatus::Completed
            && (p.progress_percentage != 100 || p.completed_at.is_none())
        {
            return Err(ProgressError::IncompleteCompletion);
        }
        if p.status == ProgressStatus::NotStarted && p.started_at.is_some() {
            return Err(ProgressError::StartedBeforeStart);
        }

        Ok(Self {
            id: p.id,
            student_id: p.student_id,
            course_id: p.course_id,
            item_type: p.item.item_type(),
            item: p.item,
            status: p.status,
            progress_percentage: p.progress_percentage,
            time_spent_minutes: p.time_spent_minutes,
            started_at: p.started_at,
            completed_at: p.completed_at,
            last_accessed: p.last_accessed,
            due_date: p.due_date,
            score: p.score,
            max_score: p.max_score,
            metadata: p.metadata,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
    }

    //
    // ─── STATE MACHINE ────────────────────────────────────────────────────────
    //

    /// Record that the student opened the item.
    ///
    /// Moves `not_started` to `in_progress`; otherwise only refreshes
    /// `last_accessed`. An overdue record stays overdue but gains `started_at`.
    pub fn mark_started(&mut self, now: DateTime<Utc>) {
        match self.status {
            ProgressStatus::NotStarted => {
                self.status = ProgressStatus::InProgress;
                self.started_at.get_or_insert(now);
            }
            ProgressStatus::Overdue => {
                self.started_at.get_or_insert(now);
            }
            ProgressStatus::InProgress | ProgressStatus::Completed => {}
        }
        self.last_accessed = Some(now);
        self.updated_at = now;
    }

    /// Apply a progress report.
    ///
    /// `percentage` is clamped to `0..=100` and never lowers the stored value.
    /// Reaching 100 completes the record.
    pub fn update_progress(&mut self, percentage: i32, time_spent_delta: u32, now: DateTime<Utc>) {
        let clamped = clamp_percentage(percentage);

        self.time_spent_minutes = self.time_spent_minutes.saturating_add(time_spent_delta);
        self.last_accessed = Some(now);
        self.updated_at = now;

        if self.status.is_completed() {
            return;
        }

        self.progress_percentage = self.progress_percentage.max(clamped);

        if clamped > 0 {
            match self.status {
                ProgressStatus::NotStarted => {
                    self.status = ProgressStatus::InProgress;
                    self.started_at.get_or_insert(now);
                }
                ProgressStatus::Overdue => {
                    self.started_at.get_or_insert(now);
                }
                ProgressStatus::InProgress | ProgressStatus::Completed => {}
            }
        }

        if clamped >= 100 {
            self.mark_completed(None, 0, now);
        }
    }

    /// Complete the record, optionally folding in a score and extra time.
    ///
    /// The score is clamped to `[0, max_score]`. A repeated completion keeps
    /// the original `completed_at`.
    pub fn mark_completed(&mut self, score: Option<f64>, time_spent_delta: u32, now: DateTime<Utc>) {
        self.status = ProgressStatus::Completed;
        self.progress_percentage = 100;
        self.started_at.get_or_insert(now);
        self.completed_at.get_or_insert(now);
        self.last_accessed = Some(now);
        self.updated_at = now;
        self.time_spent_minutes = self.time_spent_minutes.saturating_add(time_spent_delta);

        if let Some(raw) = score {
            let floored = raw.max(0.0);
            self.score = Some(match self.max_score {
                Some(max) => floored.min(max),
                None => floored,
            });
        }
    }

    /// Re-evaluate the overdue override at `now`.
    ///
    /// Returns `true` when the status changed. An overdue record whose due
    /// date no longer lies in the past drops back to its underlying state.
    pub fn check_overdue(&mut self, now: DateTime<Utc>) -> bool {
        if self.status.is_completed() {
            return false;
        }

        if self.is_overdue(now) {
            if self.status == ProgressStatus::Overdue {
                return false;
            }
            self.status = ProgressStatus::Overdue;
            self.updated_at = now;
            return true;
        }

        if self.status == ProgressStatus::Overdue {
            self.status = if self.started_at.is_some() {
                ProgressStatus::InProgress
            } else {
                ProgressStatus::NotStarted
            };
            self.updated_at = now;
            return true;
        }

        false
    }

    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_completed() && self.due_date.is_some_and(|due| due < now)
    }

    /// Whole days until the due date, rounded up. Negative once overdue.
    #[must_use]
    pub fn days_until_due(&self, now: DateTime<Utc>) -> Option<i64> {
        let due = self.due_date?;
        let seconds = due.signed_duration_since(now).num_seconds();
        Some(-(-seconds).div_euclid(SECONDS_PER_DAY))
    }

    /// `round(score / max_score * 100)` when both are present.
    #[must_use]
    pub fn grade_percentage(&self) -> Option<u32> {
        match (self.score, self.max_score) {
            (Some(score), Some(max)) if max > 0.0 => Some(percent_of(score, max)),
            _ => None,
        }
    }

    /// Move the due date. Callers re-run `check_overdue` to refresh the status.
    pub fn set_due_date(&mut self, due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.due_date = due_date;
        self.updated_at = now;
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value, now: DateTime<Utc>) {
        self.metadata.insert(key.into(), value);
        self.updated_at = now;
    }

    #[must_use]
    pub fn summary(&self, now: DateTime<Utc>) -> ProgressSummary {
        ProgressSummary {
            id: self.id,
            item_type: self.item_type,
            status: self.status,
            progress_percentage: self.progress_percentage,
            time_spent_minutes: self.time_spent_minutes,
            is_overdue: self.is_overdue(now),
            days_until_due: self.days_until_due(now),
            score: self.score,
            max_score: self.max_score,
            grade_percentage: self.grade_percentage(),
        }
    }

    //
    // ─── ACCESSORS ────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn id(&self) -> ProgressId {
        self.id
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn item(&self) -> &TrackedItem {
        &self.item
    }

    #[must_use]
    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        self.progress_percentage
    }

    #[must_use]
    pub fn time_spent_minutes(&self) -> u32 {
        self.time_spent_minutes
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn last_accessed(&self) -> Option<DateTime<Utc>> {
        self.last_accessed
    }

    #[must_use]
    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    #[must_use]
    pub fn max_score(&self) -> Option<f64> {
        self.max_score
    }

    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

//
// ─── SUMMARY VIEW ──────────────────────────────────────────────────────────────
//

/// Per-record view handed to dashboards and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub id: ProgressId,
    pub item_type: ItemType,
    pub status: ProgressStatus,
    pub progress_percentage: u8,
    pub time_spent_minutes: u32,
    pub is_overdue: bool,
    pub days_until_due: Option<i64>,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub grade_percentage: Option<u32>,
}

//
// ─── HELPERS ───────────────────────────────────────────────────────────────────
//

fn clamp_percentage(raw: i32) -> u8 {
    // Lossless: the value is clamped into u8 range first.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = raw.clamp(0, 100) as u8;
    pct
}

/// `round(part / whole * 100)`, saturating at zero for negative inputs.
#[must_use]
pub(crate) fn percent_of(part: f64, whole: f64) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = ((part / whole) * 100.0).round().max(0.0) as u32;
    pct
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
