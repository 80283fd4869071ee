use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::model::{
    CourseId, CourseItems, Enrollment, ItemType, ProgressId, ProgressRecord, ProgressStatus,
    StudentId, TrackedItem,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for progress records.
///
/// Writes are last-write-wins; there is no version check.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert a batch of new records, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if any record duplicates an existing
    /// (student, course, item) triple or another record in the batch.
    async fn insert_batch(&self, records: &[ProgressRecord]) -> Result<(), StorageError>;

    /// Fetch a record by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_record(&self, id: ProgressId) -> Result<Option<ProgressRecord>, StorageError>;

    /// Overwrite an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn update_record(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// Fetch the record tracking `item` for a student in a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn find_by_item(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        item: &TrackedItem,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// All records of a student in one course, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_for_student_course(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Whether the student already has any record in the course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn has_records(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<bool, StorageError>;

    /// Records of every student in a course, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_for_course(
        &self,
        course_id: CourseId,
        status: Option<ProgressStatus>,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Records of a student across courses, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_for_student(
        &self,
        student_id: StudentId,
        status: Option<ProgressStatus>,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Records due strictly before `before` whose status is one of `statuses`,
    /// earliest due date first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_due_before(
        &self,
        before: DateTime<Utc>,
        statuses: &[ProgressStatus],
    ) -> Result<Vec<ProgressRecord>, StorageError>;
}

/// Repository contract for enrollments.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Persist a new enrollment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the student is already enrolled.
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// Fetch a student's enrollment in a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// Overwrite progress fields of an existing enrollment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist.
    async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// All enrollments of a student, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_enrollments(&self, student_id: StudentId)
    -> Result<Vec<Enrollment>, StorageError>;
}

/// Read access to the course structure owned by the course service.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Modules, assignments and quizzes of a course, or `None` if the course
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn course_items(&self, course_id: CourseId) -> Result<Option<CourseItems>, StorageError>;

    /// Replace a course and all of its items.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, items: &CourseItems) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

type ItemKey = (StudentId, CourseId, ItemType, String);

fn item_key(record: &ProgressRecord) -> ItemKey {
    (
        record.student_id(),
        record.course_id(),
        record.item_type(),
        record.item().item_key(),
    )
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Records keep insertion order so listings match the `SQLite` backend.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<Vec<ProgressRecord>>>,
    enrollments: Arc<Mutex<Vec<Enrollment>>>,
    courses: Arc<Mutex<HashMap<CourseId, CourseItems>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn select<F>(&self, keep: F) -> Result<Vec<ProgressRecord>, StorageError>
    where
        F: Fn(&ProgressRecord) -> bool,
    {
        let guard = lock(&self.progress)?;
        Ok(guard.iter().filter(|&r| keep(r)).cloned().collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn insert_batch(&self, records: &[ProgressRecord]) -> Result<(), StorageError> {
        let mut guard = lock(&self.progress)?;

        let mut seen: Vec<ItemKey> = guard.iter().map(item_key).collect();
        for record in records {
            let key = item_key(record);
            if seen.contains(&key) || guard.iter().any(|r| r.id() == record.id()) {
                return Err(StorageError::Conflict);
            }
            seen.push(key);
        }

        guard.extend(records.iter().cloned());
        Ok(())
    }

    async fn get_record(&self, id: ProgressId) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = lock(&self.progress)?;
        Ok(guard.iter().find(|r| r.id() == id).cloned())
    }

    async fn update_record(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = lock(&self.progress)?;
        let slot = guard
            .iter_mut()
            .find(|r| r.id() == record.id())
            .ok_or(StorageError::NotFound)?;
        *slot = record.clone();
        Ok(())
    }

    async fn find_by_item(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        item: &TrackedItem,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = lock(&self.progress)?;
        Ok(guard
            .iter()
            .find(|r| r.student_id() == student_id && r.course_id() == course_id && r.item() == item)
            .cloned())
    }

    async fn list_for_student_course(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.select(|r| r.student_id() == student_id && r.course_id() == course_id)
    }

    async fn has_records(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<bool, StorageError> {
        let guard = lock(&self.progress)?;
        Ok(guard
            .iter()
            .any(|r| r.student_id() == student_id && r.course_id() == course_id))
    }

    async fn list_for_course(
        &self,
        course_id: CourseId,
        status: Option<ProgressStatus>,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.select(|r| r.course_id() == course_id && status.is_none_or(|s| r.status() == s))
    }

    async fn list_for_student(
        &self,
        student_id: StudentId,
        status: Option<ProgressStatus>,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.select(|r| r.student_id() == student_id && status.is_none_or(|s| r.status() == s))
    }

    async fn list_due_before(
        &self,
        before: DateTime<Utc>,
        statuses: &[ProgressStatus],
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let mut due = self.select(|r| {
            statuses.contains(&r.status()) && r.due_date().is_some_and(|d| d < before)
        })?;
        due.sort_by_key(ProgressRecord::due_date);
        Ok(due)
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let mut guard = lock(&self.enrollments)?;
        if guard.iter().any(|e| {
            e.id == enrollment.id
                || (e.student_id == enrollment.student_id && e.course_id == enrollment.course_id)
        }) {
            return Err(StorageError::Conflict);
        }
        guard.push(enrollment.clone());
        Ok(())
    }

    async fn get_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let guard = lock(&self.enrollments)?;
        Ok(guard
            .iter()
            .find(|e| e.student_id == student_id && e.course_id == course_id)
            .cloned())
    }

    async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let mut guard = lock(&self.enrollments)?;
        let slot = guard
            .iter_mut()
            .find(|e| e.id == enrollment.id)
            .ok_or(StorageError::NotFound)?;
        *slot = enrollment.clone();
        Ok(())
    }

    async fn list_enrollments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let guard = lock(&self.enrollments)?;
        let mut found: Vec<Enrollment> = guard
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.enrolled_at);
        Ok(found)
    }
}

#[async_trait]
impl CourseCatalog for InMemoryRepository {
    async fn course_items(&self, course_id: CourseId) -> Result<Option<CourseItems>, StorageError> {
        let guard = lock(&self.courses)?;
        Ok(guard.get(&course_id).cloned())
    }

    async fn upsert_course(&self, items: &CourseItems) -> Result<(), StorageError> {
        let mut guard = lock(&self.courses)?;
        guard.insert(items.course_id, items.clone());
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub courses: Arc<dyn CourseCatalog>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let enrollments: Arc<dyn EnrollmentRepository> = Arc::new(repo.clone());
        let courses: Arc<dyn CourseCatalog> = Arc::new(repo);
        Self {
            progress,
            enrollments,
            courses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use learn_core::model::{ContentKind, ModuleId};
    use learn_core::time::fixed_now;

    fn module_record(student: StudentId, course: CourseId) -> ProgressRecord {
        ProgressRecord::new(
            student,
            course,
            TrackedItem::Module {
                module_id: ModuleId::new(),
            },
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn batch_with_duplicate_item_inserts_nothing() {
        let repo = InMemoryRepository::new();
        let (student, course) = (StudentId::new(), CourseId::new());
        let first = module_record(student, course);
        let twin = ProgressRecord::new(student, course, first.item().clone(), fixed_now());

        let err = repo
            .insert_batch(&[first.clone(), module_record(student, course), twin])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict));
        assert!(!repo.has_records(student, course).await.unwrap());
    }

    #[tokio::test]
    async fn distinct_readings_in_one_course_coexist() {
        let repo = InMemoryRepository::new();
        let (student, course) = (StudentId::new(), CourseId::new());
        let reading = |reference: &str| {
            ProgressRecord::new(
                student,
                course,
                TrackedItem::Content {
                    content: ContentKind::Reading,
                    reference: reference.into(),
                },
                fixed_now(),
            )
        };

        repo.insert_batch(&[reading("ch-1"), reading("ch-2")])
            .await
            .unwrap();
        let found = repo.list_for_student_course(student, course).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn update_round_trips_state() {
        let repo = InMemoryRepository::new();
        let (student, course) = (StudentId::new(), CourseId::new());
        let mut record = module_record(student, course);
        repo.insert_batch(std::slice::from_ref(&record)).await.unwrap();

        record.update_progress(60, 15, fixed_now());
        repo.update_record(&record).await.unwrap();

        let fetched = repo.get_record(record.id()).await.unwrap().unwrap();
        assert_eq!(fetched.status(), ProgressStatus::InProgress);
        assert_eq!(fetched.time_spent_minutes(), 15);

        let in_progress = repo
            .list_for_student(student, Some(ProgressStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(in_progress.len(), 1);
    }

    #[tokio::test]
    async fn update_of_unknown_record_is_not_found() {
        let repo = InMemoryRepository::new();
        let record = module_record(StudentId::new(), CourseId::new());
        let err = repo.update_record(&record).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn due_before_filters_status_and_orders_by_due_date() {
        let repo = InMemoryRepository::new();
        let (student, course) = (StudentId::new(), CourseId::new());
        let now = fixed_now();
        let early = module_record(student, course).with_due_date(Some(now - Duration::days(3)));
        let late = module_record(student, course).with_due_date(Some(now - Duration::days(1)));
        let future = module_record(student, course).with_due_date(Some(now + Duration::days(1)));
        let mut done = module_record(student, course).with_due_date(Some(now - Duration::days(2)));
        done.mark_completed(None, 0, now);

        repo.insert_batch(&[late.clone(), future, done, early.clone()])
            .await
            .unwrap();

        let due = repo
            .list_due_before(now, &[ProgressStatus::NotStarted, ProgressStatus::InProgress])
            .await
            .unwrap();
        let ids: Vec<_> = due.iter().map(ProgressRecord::id).collect();
        assert_eq!(ids, vec![early.id(), late.id()]);
    }

    #[tokio::test]
    async fn duplicate_enrollment_conflicts() {
        let repo = InMemoryRepository::new();
        let enrollment = Enrollment::new(StudentId::new(), CourseId::new(), fixed_now());
        repo.insert_enrollment(&enrollment).await.unwrap();

        let again = Enrollment::new(enrollment.student_id, enrollment.course_id, fixed_now());
        let err = repo.insert_enrollment(&again).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }
}
