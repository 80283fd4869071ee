use chrono::Duration;
use learn_core::initialize::initial_records;
use learn_core::model::{
    AssignmentId, ContentKind, CourseAssignment, CourseId, CourseItems, CourseModule, CourseQuiz,
    Enrollment, ModuleId, ProgressRecord, ProgressStatus, QuizId, StudentId, TrackedItem,
};
use learn_core::time::fixed_now;
use serde_json::json;
use storage::repository::{
    CourseCatalog, EnrollmentRepository, ProgressRepository, Storage, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn sample_course() -> CourseItems {
    let mut course = CourseItems::empty(CourseId::new(), "Rust 101");
    course.modules.push(CourseModule {
        id: ModuleId::new(),
        title: "Ownership".into(),
        order: 1,
    });
    course.modules.push(CourseModule {
        id: ModuleId::new(),
        title: "Setup".into(),
        order: 0,
    });
    course.assignments.push(CourseAssignment {
        id: AssignmentId::new(),
        title: "Borrow checker kata".into(),
        due_date: Some(fixed_now() + Duration::days(3)),
        max_score: Some(20.0),
    });
    course.quizzes.push(CourseQuiz {
        id: QuizId::new(),
        title: "Checkpoint".into(),
        question_points: vec![4.0, 6.0],
    });
    course
}

#[tokio::test]
async fn course_catalog_round_trips_items() {
    let repo = connect("memdb_course_catalog").await;
    let course = sample_course();
    repo.upsert_course(&course).await.unwrap();

    let fetched = repo.course_items(course.course_id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "Rust 101");
    assert_eq!(fetched.modules[0].title, "Setup");
    assert_eq!(fetched.modules[1].title, "Ownership");
    assert_eq!(fetched.assignments, course.assignments);
    assert_eq!(fetched.quizzes, course.quizzes);

    let mut renamed = course.clone();
    renamed.title = "Rust 102".into();
    renamed.quizzes.clear();
    repo.upsert_course(&renamed).await.unwrap();
    let fetched = repo.course_items(course.course_id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "Rust 102");
    assert!(fetched.quizzes.is_empty());

    assert!(repo.course_items(CourseId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn progress_records_round_trip_with_state() {
    let repo = connect("memdb_progress_roundtrip").await;
    let student = StudentId::new();
    let course = sample_course();
    let records = initial_records(student, &course, fixed_now());
    repo.insert_batch(&records).await.unwrap();

    assert!(repo.has_records(student, course.course_id).await.unwrap());
    let listed = repo
        .list_for_student_course(student, course.course_id)
        .await
        .unwrap();
    assert_eq!(listed, records);

    let mut quiz = records
        .iter()
        .find(|r| r.item().quiz_id().is_some())
        .cloned()
        .unwrap();
    quiz.set_metadata("attempts", json!(2), fixed_now());
    quiz.mark_completed(Some(7.5), 12, fixed_now() + Duration::hours(1));
    repo.update_record(&quiz).await.unwrap();

    let fetched = repo.get_record(quiz.id()).await.unwrap().unwrap();
    assert_eq!(fetched, quiz);
    assert_eq!(fetched.status(), ProgressStatus::Completed);
    assert_eq!(fetched.metadata().get("attempts"), Some(&json!(2)));

    let by_item = repo
        .find_by_item(student, course.course_id, quiz.item())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_item.id(), quiz.id());
}

#[tokio::test]
async fn duplicate_batch_conflicts_and_rolls_back() {
    let repo = connect("memdb_progress_conflict").await;
    let (student, course) = (StudentId::new(), CourseId::new());
    let video = TrackedItem::Content {
        content: ContentKind::Video,
        reference: "intro.mp4".into(),
    };
    let first = ProgressRecord::new(student, course, video.clone(), fixed_now());
    repo.insert_batch(std::slice::from_ref(&first)).await.unwrap();

    let fresh = ProgressRecord::new(
        student,
        course,
        TrackedItem::Module {
            module_id: ModuleId::new(),
        },
        fixed_now(),
    );
    let twin = ProgressRecord::new(student, course, video, fixed_now());
    let err = repo.insert_batch(&[fresh.clone(), twin]).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    assert!(repo.get_record(fresh.id()).await.unwrap().is_none());
    let listed = repo.list_for_student_course(student, course).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn update_of_missing_record_is_not_found() {
    let repo = connect("memdb_progress_missing").await;
    let record = ProgressRecord::new(
        StudentId::new(),
        CourseId::new(),
        TrackedItem::Quiz {
            quiz_id: QuizId::new(),
        },
        fixed_now(),
    );
    let err = repo.update_record(&record).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn status_filters_and_due_ordering() {
    let repo = connect("memdb_progress_due").await;
    let (student, course) = (StudentId::new(), CourseId::new());
    let now = fixed_now();
    let module = |due| {
        ProgressRecord::new(
            student,
            course,
            TrackedItem::Module {
                module_id: ModuleId::new(),
            },
            now,
        )
        .with_due_date(due)
    };

    let late = module(Some(now - Duration::hours(2)));
    let mut started = module(Some(now - Duration::days(2)));
    started.mark_started(now - Duration::days(3));
    let upcoming = module(Some(now + Duration::days(2)));
    let undated = module(None);
    repo.insert_batch(&[late.clone(), started.clone(), upcoming, undated])
        .await
        .unwrap();

    let due = repo
        .list_due_before(now, &[ProgressStatus::NotStarted, ProgressStatus::InProgress])
        .await
        .unwrap();
    let ids: Vec<_> = due.iter().map(ProgressRecord::id).collect();
    assert_eq!(ids, vec![started.id(), late.id()]);

    let in_progress = repo
        .list_for_course(course, Some(ProgressStatus::InProgress))
        .await
        .unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(repo.list_for_course(course, None).await.unwrap().len(), 4);
    assert_eq!(
        repo.list_for_student(student, Some(ProgressStatus::NotStarted))
            .await
            .unwrap()
            .len(),
        3
    );
    assert!(repo.list_due_before(now, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn enrollments_are_unique_and_updatable() {
    let repo = connect("memdb_enrollments").await;
    let student = StudentId::new();
    let first = Enrollment::new(student, CourseId::new(), fixed_now());
    let second = Enrollment::new(student, CourseId::new(), fixed_now() + Duration::days(1));
    repo.insert_enrollment(&second).await.unwrap();
    repo.insert_enrollment(&first).await.unwrap();

    let dup = Enrollment::new(student, first.course_id, fixed_now());
    let err = repo.insert_enrollment(&dup).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let mut updated = first.clone();
    updated.progress = 100;
    updated.completed = true;
    repo.update_enrollment(&updated).await.unwrap();

    let fetched = repo
        .get_enrollment(student, first.course_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, updated);

    let listed = repo.list_enrollments(student).await.unwrap();
    let courses: Vec<_> = listed.iter().map(|e| e.course_id).collect();
    assert_eq!(courses, vec![first.course_id, second.course_id]);
}

#[tokio::test]
async fn storage_sqlite_wires_all_repositories() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage_wiring?mode=memory&cache=shared")
        .await
        .expect("storage");
    let course = sample_course();
    storage.courses.upsert_course(&course).await.unwrap();

    let student = StudentId::new();
    let records = initial_records(student, &course, fixed_now());
    storage.progress.insert_batch(&records).await.unwrap();
    storage
        .enrollments
        .insert_enrollment(&Enrollment::new(student, course.course_id, fixed_now()))
        .await
        .unwrap();

    assert_eq!(
        storage
            .progress
            .list_for_student_course(student, course.course_id)
            .await
            .unwrap()
            .len(),
        course.item_count()
    );
}
