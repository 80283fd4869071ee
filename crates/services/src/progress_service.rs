use std::collections::HashMap;
use std::sync::Arc;

use learn_core::initialize::initial_records;
use learn_core::model::{
    CourseId, Enrollment, ProgressId, ProgressRecord, ProgressStatus, ProgressSummary, StudentId,
    TrackedItem,
};
use learn_core::rollup::{
    CourseProgress, CourseStatistics, compute_course_progress, compute_course_statistics,
    compute_overdue_items, compute_upcoming_deadlines,
};
use serde::Serialize;
use storage::repository::{CourseCatalog, EnrollmentRepository, ProgressRepository, StorageError};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::config::ProgressConfig;
use crate::error::ProgressServiceError;

/// Per-student overview across all enrolled courses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentDashboard {
    pub enrolled_courses: u32,
    pub completed_courses: u32,
    pub in_progress_items: u32,
    pub overdue_items: Vec<ProgressSummary>,
    pub upcoming_deadlines: Vec<ProgressSummary>,
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Request-level progress workflows: enrollment, activity events and rollups.
///
/// Every mutation fetches one record, applies the state machine at
/// `clock.now()` and writes it back. Enrollment progress is re-synced after
/// each write.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    config: ProgressConfig,
    progress: Arc<dyn ProgressRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    courses: Arc<dyn CourseCatalog>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        config: ProgressConfig,
        progress: Arc<dyn ProgressRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        courses: Arc<dyn CourseCatalog>,
    ) -> Self {
        Self {
            clock,
            config,
            progress,
            enrollments,
            courses,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    //
    // ─── ENROLLMENT & INITIALIZATION ──────────────────────────────────────────
    //

    /// Enroll a student and create their progress records.
    ///
    /// Records are created before the enrollment row, so a failed
    /// initialization leaves nothing behind and the call can be retried.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound` for an unknown course, `AlreadyEnrolled` for a
    /// duplicate enrollment, and `Storage` if persistence fails.
    pub async fn enroll_student(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Enrollment, ProgressServiceError> {
        if self.courses.course_items(course_id).await?.is_none() {
            return Err(ProgressServiceError::CourseNotFound(course_id));
        }
        if self
            .enrollments
            .get_enrollment(student_id, course_id)
            .await?
            .is_some()
        {
            return Err(ProgressServiceError::AlreadyEnrolled {
                student_id,
                course_id,
            });
        }

        self.initialize_student_progress(student_id, course_id)
            .await?;

        let enrollment = Enrollment::new(student_id, course_id, self.clock.now());
        match self.enrollments.insert_enrollment(&enrollment).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => {
                return Err(ProgressServiceError::AlreadyEnrolled {
                    student_id,
                    course_id,
                });
            }
            Err(e) => return Err(e.into()),
        }
        info!(%student_id, %course_id, "student enrolled");

        let enrollment = self
            .sync_enrollment(student_id, course_id)
            .await?
            .unwrap_or(enrollment);
        Ok(enrollment)
    }

    /// Create one record per trackable item of the course.
    ///
    /// Returns `Ok(false)` when the course does not exist. A student who
    /// already has records for the course is left untouched and `Ok(true)`
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lookup or the batch insert fails.
    pub async fn initialize_student_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<bool, ProgressServiceError> {
        let Some(items) = self.courses.course_items(course_id).await? else {
            warn!(%course_id, "cannot initialize progress for unknown course");
            return Ok(false);
        };

        if self.progress.has_records(student_id, course_id).await? {
            warn!(%student_id, %course_id, "progress already initialized, skipping");
            return Ok(true);
        }

        let records = initial_records(student_id, &items, self.clock.now());
        match self.progress.insert_batch(&records).await {
            Ok(()) => {}
            // A concurrent initializer won the unique index.
            Err(StorageError::Conflict) => {
                warn!(%student_id, %course_id, "progress initialized concurrently, skipping");
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        }

        info!(%student_id, %course_id, records = records.len(), "initialized progress");
        Ok(true)
    }

    //
    // ─── ACTIVITY EVENTS ──────────────────────────────────────────────────────
    //

    /// Mark a record as started.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` for an unknown record and `Storage` on
    /// persistence failures.
    pub async fn mark_started(
        &self,
        record_id: ProgressId,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        self.mutate(record_id, |record, now| record.mark_started(now))
            .await
    }

    /// Apply a progress report to a record.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` for an unknown record and `Storage` on
    /// persistence failures.
    pub async fn update_progress(
        &self,
        record_id: ProgressId,
        percentage: i32,
        time_spent_delta: u32,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        self.mutate(record_id, |record, now| {
            record.update_progress(percentage, time_spent_delta, now);
        })
        .await
    }

    /// Complete a record with an optional score.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` for an unknown record and `Storage` on
    /// persistence failures.
    pub async fn mark_completed(
        &self,
        record_id: ProgressId,
        score: Option<f64>,
        time_spent_delta: u32,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        self.mutate(record_id, |record, now| {
            record.mark_completed(score, time_spent_delta, now);
        })
        .await
    }

    /// Content-access event: start the record tracking `item`.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` when the student has no record for the item and
    /// `Storage` on persistence failures.
    pub async fn start_item(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        item: &TrackedItem,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        let mut record = self
            .progress
            .find_by_item(student_id, course_id, item)
            .await?
            .ok_or(ProgressServiceError::ItemNotFound {
                student_id,
                course_id,
            })?;

        record.mark_started(self.clock.now());
        self.progress.update_record(&record).await?;
        debug!(record_id = %record.id(), status = %record.status(), "item accessed");

        self.sync_enrollment(student_id, course_id).await?;
        Ok(record)
    }

    /// Flip every incomplete record whose due date has passed to overdue.
    ///
    /// Returns the number of records changed.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the sweep cannot read or write records.
    pub async fn refresh_overdue(&self) -> Result<usize, ProgressServiceError> {
        let now = self.clock.now();
        let candidates = self
            .progress
            .list_due_before(now, &[ProgressStatus::NotStarted, ProgressStatus::InProgress])
            .await?;

        let mut changed = 0;
        for mut record in candidates {
            if record.check_overdue(now) {
                self.progress.update_record(&record).await?;
                changed += 1;
            }
        }

        info!(changed, "overdue sweep finished");
        Ok(changed)
    }

    //
    // ─── QUERIES ──────────────────────────────────────────────────────────────
    //

    /// Rollup of one student's records in one course.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled` when the student is not enrolled in the course.
    pub async fn course_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<CourseProgress, ProgressServiceError> {
        if self
            .enrollments
            .get_enrollment(student_id, course_id)
            .await?
            .is_none()
        {
            return Err(ProgressServiceError::NotEnrolled {
                student_id,
                course_id,
            });
        }

        let records = self
            .progress
            .list_for_student_course(student_id, course_id)
            .await?;
        Ok(compute_course_progress(student_id, course_id, &records))
    }

    /// Summaries of every record a student has in a course.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the records cannot be read.
    pub async fn record_summaries(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressSummary>, ProgressServiceError> {
        let now = self.clock.now();
        let records = self
            .progress
            .list_for_student_course(student_id, course_id)
            .await?;
        Ok(records.iter().map(|r| r.summary(now)).collect())
    }

    /// Incomplete past-due items across all of a student's courses.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the records cannot be read.
    pub async fn overdue_items(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<ProgressSummary>, ProgressServiceError> {
        let now = self.clock.now();
        let records = self.progress.list_for_student(student_id, None).await?;
        Ok(compute_overdue_items(&records, now)
            .into_iter()
            .map(|r| r.summary(now))
            .collect())
    }

    /// Incomplete items due within the window; `None` uses the configured
    /// default.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the records cannot be read.
    pub async fn upcoming_deadlines(
        &self,
        student_id: StudentId,
        window_days: Option<u32>,
    ) -> Result<Vec<ProgressSummary>, ProgressServiceError> {
        let now = self.clock.now();
        let window = window_days.unwrap_or(self.config.upcoming_window_days);
        let records = self.progress.list_for_student(student_id, None).await?;
        Ok(compute_upcoming_deadlines(&records, now, window)
            .into_iter()
            .map(|r| r.summary(now))
            .collect())
    }

    /// Cross-student statistics for a course.
    ///
    /// Students are counted from progress records, not enrollments, so
    /// enrollees of a course without trackable items are not counted.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the records cannot be read.
    pub async fn course_statistics(
        &self,
        course_id: CourseId,
    ) -> Result<CourseStatistics, ProgressServiceError> {
        let records = self.progress.list_for_course(course_id, None).await?;

        let mut by_student: HashMap<StudentId, Vec<ProgressRecord>> = HashMap::new();
        for record in records {
            by_student.entry(record.student_id()).or_default().push(record);
        }

        let rollups: Vec<CourseProgress> = by_student
            .iter()
            .map(|(student_id, records)| compute_course_progress(*student_id, course_id, records))
            .collect();
        Ok(compute_course_statistics(&rollups))
    }

    /// Overview for a student's landing page.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if enrollments or records cannot be read.
    pub async fn student_dashboard(
        &self,
        student_id: StudentId,
    ) -> Result<StudentDashboard, ProgressServiceError> {
        let now = self.clock.now();
        let enrollments = self.enrollments.list_enrollments(student_id).await?;
        let records = self.progress.list_for_student(student_id, None).await?;

        let in_progress_items = records
            .iter()
            .filter(|r| r.status() == ProgressStatus::InProgress)
            .count();

        Ok(StudentDashboard {
            enrolled_courses: count_u32(enrollments.len()),
            completed_courses: count_u32(enrollments.iter().filter(|e| e.completed).count()),
            in_progress_items: count_u32(in_progress_items),
            overdue_items: compute_overdue_items(&records, now)
                .into_iter()
                .map(|r| r.summary(now))
                .collect(),
            upcoming_deadlines: compute_upcoming_deadlines(
                &records,
                now,
                self.config.upcoming_window_days,
            )
            .into_iter()
            .map(|r| r.summary(now))
            .collect(),
        })
    }

    //
    // ─── INTERNALS ────────────────────────────────────────────────────────────
    //

    async fn mutate<F>(
        &self,
        record_id: ProgressId,
        apply: F,
    ) -> Result<ProgressRecord, ProgressServiceError>
    where
        F: FnOnce(&mut ProgressRecord, chrono::DateTime<chrono::Utc>),
    {
        let mut record = self
            .progress
            .get_record(record_id)
            .await?
            .ok_or(ProgressServiceError::RecordNotFound(record_id))?;

        let before = record.status();
        apply(&mut record, self.clock.now());
        self.progress.update_record(&record).await?;
        debug!(%record_id, from = %before, to = %record.status(), "progress updated");

        self.sync_enrollment(record.student_id(), record.course_id())
            .await?;
        Ok(record)
    }

    /// Copy the current rollup onto the enrollment, if there is one.
    async fn sync_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, ProgressServiceError> {
        let Some(mut enrollment) = self
            .enrollments
            .get_enrollment(student_id, course_id)
            .await?
        else {
            return Ok(None);
        };

        let records = self
            .progress
            .list_for_student_course(student_id, course_id)
            .await?;
        let rollup = compute_course_progress(student_id, course_id, &records);
        if enrollment.apply_rollup(&rollup) {
            self.enrollments.update_enrollment(&enrollment).await?;
            debug!(
                %student_id,
                %course_id,
                progress = enrollment.progress,
                completed = enrollment.completed,
                "enrollment progress synced"
            );
        }
        Ok(Some(enrollment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use learn_core::model::{AssignmentId, CourseAssignment, CourseItems, CourseModule, ModuleId};
    use learn_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, Storage};

    fn service_with(storage: &Storage, clock: Clock) -> ProgressService {
        ProgressService::new(
            clock,
            ProgressConfig::default(),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.courses),
        )
    }

    fn two_item_course(due: DateTime<Utc>) -> CourseItems {
        let mut course = CourseItems::empty(CourseId::new(), "Intro");
        course.modules.push(CourseModule {
            id: ModuleId::new(),
            title: "Welcome".into(),
            order: 0,
        });
        course.assignments.push(CourseAssignment {
            id: AssignmentId::new(),
            title: "Essay".into(),
            due_date: Some(due),
            max_score: Some(50.0),
        });
        course
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let storage = Storage::in_memory();
        let course = two_item_course(fixed_now() + Duration::days(2));
        storage.courses.upsert_course(&course).await.unwrap();
        let service = service_with(&storage, Clock::fixed(fixed_now()));
        let student = StudentId::new();

        assert!(service
            .initialize_student_progress(student, course.course_id)
            .await
            .unwrap());
        assert!(service
            .initialize_student_progress(student, course.course_id)
            .await
            .unwrap());

        let records = storage
            .progress
            .list_for_student_course(student, course.course_id)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn initialize_unknown_course_returns_false() {
        let storage = Storage::in_memory();
        let service = service_with(&storage, Clock::fixed(fixed_now()));
        let created = service
            .initialize_student_progress(StudentId::new(), CourseId::new())
            .await
            .unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn enroll_twice_is_rejected() {
        let storage = Storage::in_memory();
        let course = two_item_course(fixed_now() + Duration::days(2));
        storage.courses.upsert_course(&course).await.unwrap();
        let service = service_with(&storage, Clock::fixed(fixed_now()));
        let student = StudentId::new();

        service.enroll_student(student, course.course_id).await.unwrap();
        let err = service
            .enroll_student(student, course.course_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::AlreadyEnrolled { .. }));

        let err = service
            .enroll_student(student, CourseId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn completing_every_item_completes_the_enrollment() {
        let storage = Storage::in_memory();
        let course = two_item_course(fixed_now() + Duration::days(2));
        storage.courses.upsert_course(&course).await.unwrap();
        let service = service_with(&storage, Clock::fixed(fixed_now()));
        let student = StudentId::new();
        service.enroll_student(student, course.course_id).await.unwrap();

        let records = storage
            .progress
            .list_for_student_course(student, course.course_id)
            .await
            .unwrap();
        service
            .update_progress(records[0].id(), 100, 20)
            .await
            .unwrap();
        let enrollment = storage
            .enrollments
            .get_enrollment(student, course.course_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(enrollment.progress, 50);
        assert!(!enrollment.completed);

        let graded = service
            .mark_completed(records[1].id(), Some(80.0), 0)
            .await
            .unwrap();
        assert_eq!(graded.score(), Some(50.0));

        let enrollment = storage
            .enrollments
            .get_enrollment(student, course.course_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(enrollment.progress, 100);
        assert!(enrollment.completed);
    }

    #[tokio::test]
    async fn unknown_record_is_reported() {
        let storage = Storage::in_memory();
        let service = service_with(&storage, Clock::fixed(fixed_now()));
        let missing = ProgressId::new();
        let err = service.mark_started(missing).await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::RecordNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn course_progress_requires_enrollment() {
        let storage = Storage::in_memory();
        let service = service_with(&storage, Clock::fixed(fixed_now()));
        let err = service
            .course_progress(StudentId::new(), CourseId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::NotEnrolled { .. }));
    }

    #[tokio::test]
    async fn refresh_overdue_flips_past_due_items_only() {
        let storage = Storage::in_memory();
        let course = two_item_course(fixed_now() + Duration::days(1));
        storage.courses.upsert_course(&course).await.unwrap();
        let student = StudentId::new();
        service_with(&storage, Clock::fixed(fixed_now()))
            .enroll_student(student, course.course_id)
            .await
            .unwrap();

        let later = service_with(&storage, Clock::fixed(fixed_now() + Duration::days(3)));
        assert_eq!(later.refresh_overdue().await.unwrap(), 1);
        assert_eq!(later.refresh_overdue().await.unwrap(), 0);

        let overdue = later.overdue_items(student).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].status, ProgressStatus::Overdue);
        assert_eq!(overdue[0].days_until_due, Some(-2));
    }

    #[tokio::test]
    async fn upcoming_window_defaults_to_config() {
        let storage = Storage::in_memory();
        let course = two_item_course(fixed_now() + Duration::days(10));
        storage.courses.upsert_course(&course).await.unwrap();
        let service = service_with(&storage, Clock::fixed(fixed_now()));
        let student = StudentId::new();
        service.enroll_student(student, course.course_id).await.unwrap();

        assert!(service.upcoming_deadlines(student, None).await.unwrap().is_empty());
        let wide = service.upcoming_deadlines(student, Some(14)).await.unwrap();
        assert_eq!(wide.len(), 1);
        assert_eq!(wide[0].days_until_due, Some(10));
    }

    #[tokio::test]
    async fn start_item_uses_the_item_discriminator() {
        let storage = Storage::in_memory();
        let course = two_item_course(fixed_now() + Duration::days(2));
        storage.courses.upsert_course(&course).await.unwrap();
        let service = service_with(&storage, Clock::fixed(fixed_now()));
        let student = StudentId::new();
        service.enroll_student(student, course.course_id).await.unwrap();

        let item = TrackedItem::Module {
            module_id: course.modules[0].id,
        };
        let started = service
            .start_item(student, course.course_id, &item)
            .await
            .unwrap();
        assert_eq!(started.status(), ProgressStatus::InProgress);
        assert_eq!(started.started_at(), Some(fixed_now()));

        let stranger = TrackedItem::Module {
            module_id: ModuleId::new(),
        };
        let err = service
            .start_item(student, course.course_id, &stranger)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProgressServiceError::ItemNotFound { student_id, course_id }
                if student_id == student && course_id == course.course_id
        ));
    }

    struct FailingCatalog;

    #[async_trait]
    impl CourseCatalog for FailingCatalog {
        async fn course_items(
            &self,
            _course_id: CourseId,
        ) -> Result<Option<CourseItems>, StorageError> {
            Err(StorageError::Connection("catalog offline".into()))
        }

        async fn upsert_course(&self, _items: &CourseItems) -> Result<(), StorageError> {
            Err(StorageError::Connection("catalog offline".into()))
        }
    }

    /// Serves the course for the first `healthy` lookups, then fails.
    struct FlakyCatalog {
        course: CourseItems,
        healthy: usize,
        lookups: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl CourseCatalog for FlakyCatalog {
        async fn course_items(
            &self,
            _course_id: CourseId,
        ) -> Result<Option<CourseItems>, StorageError> {
            let seen = self
                .lookups
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if seen < self.healthy {
                Ok(Some(self.course.clone()))
            } else {
                Err(StorageError::Connection("catalog offline".into()))
            }
        }

        async fn upsert_course(&self, _items: &CourseItems) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_initialization_leaves_enrollment_retryable() {
        let storage = Storage::in_memory();
        let course = two_item_course(fixed_now() + Duration::days(2));
        storage.courses.upsert_course(&course).await.unwrap();
        let student = StudentId::new();

        let flaky = ProgressService::new(
            Clock::fixed(fixed_now()),
            ProgressConfig::default(),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.enrollments),
            Arc::new(FlakyCatalog {
                course: course.clone(),
                healthy: 1,
                lookups: std::sync::atomic::AtomicUsize::new(0),
            }),
        );
        let err = flaky
            .enroll_student(student, course.course_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProgressServiceError::Storage(StorageError::Connection(_))
        ));
        assert!(storage
            .enrollments
            .get_enrollment(student, course.course_id)
            .await
            .unwrap()
            .is_none());

        let service = service_with(&storage, Clock::fixed(fixed_now()));
        let enrollment = service.enroll_student(student, course.course_id).await.unwrap();
        assert_eq!(enrollment.progress, 0);
        let records = storage
            .progress
            .list_for_student_course(student, course.course_id)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn enroll_keeps_existing_progress_records() {
        let storage = Storage::in_memory();
        let course = two_item_course(fixed_now() + Duration::days(2));
        storage.courses.upsert_course(&course).await.unwrap();
        let service = service_with(&storage, Clock::fixed(fixed_now()));
        let student = StudentId::new();

        service
            .initialize_student_progress(student, course.course_id)
            .await
            .unwrap();
        service.enroll_student(student, course.course_id).await.unwrap();
        let records = storage
            .progress
            .list_for_student_course(student, course.course_id)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn statistics_count_students_with_records_only() {
        let storage = Storage::in_memory();
        let empty = CourseItems::empty(CourseId::new(), "Reading list");
        storage.courses.upsert_course(&empty).await.unwrap();
        let service = service_with(&storage, Clock::fixed(fixed_now()));

        service
            .enroll_student(StudentId::new(), empty.course_id)
            .await
            .unwrap();
        let stats = service.course_statistics(empty.course_id).await.unwrap();
        assert_eq!(stats.total_students, 0);
    }

    #[tokio::test]
    async fn store_failures_propagate_unchanged() {
        let repo = InMemoryRepository::new();
        let service = ProgressService::new(
            Clock::fixed(fixed_now()),
            ProgressConfig::default(),
            Arc::new(repo.clone()),
            Arc::new(repo),
            Arc::new(FailingCatalog),
        );

        let err = service
            .initialize_student_progress(StudentId::new(), CourseId::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProgressServiceError::Storage(StorageError::Connection(_))
        ));
    }
}
