//! `learn-progress`: command-line front end for course progress tracking.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use learn_core::model::{
    AssignmentId, ContentKind, CourseAssignment, CourseId, CourseItems, CourseModule, CourseQuiz,
    ModuleId, ProgressId, QuizId, StudentId, TrackedItem,
};
use serde_json::json;
use services::{AppServices, Clock, ProgressConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "learn-progress")]
#[command(about = "Track student progress through course content", long_about = None)]
struct Cli {
    /// SQLite URL or file path (overrides LEARN_DB_URL)
    #[arg(long, global = true)]
    db: Option<String>,
    /// Default look-ahead for upcoming deadlines (overrides LEARN_UPCOMING_WINDOW_DAYS)
    #[arg(long, global = true)]
    window_days: Option<u32>,
    /// Pin the clock to an RFC 3339 timestamp
    #[arg(long, global = true, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,
    /// Write a demo course into the catalog
    SeedCourse {
        title: String,
        #[arg(long, default_value = "2")]
        modules: u32,
        #[arg(long, default_value = "1")]
        assignments: u32,
        /// Assignment due date, in days from now
        #[arg(long, default_value = "7", allow_hyphen_values = true)]
        due_in_days: i64,
        #[arg(long, default_value = "100")]
        max_score: f64,
        /// Points per quiz question
        #[arg(long, value_delimiter = ',', default_value = "2,3,5")]
        quiz_points: Vec<f64>,
        #[arg(long)]
        no_quiz: bool,
    },
    /// Enroll a student and initialize their progress
    Enroll {
        #[arg(long)]
        student: StudentId,
        #[arg(long)]
        course: CourseId,
    },
    /// Initialize progress records without enrolling
    Init {
        #[arg(long)]
        student: StudentId,
        #[arg(long)]
        course: CourseId,
    },
    /// Mark an item as started, by record id or by item
    Start {
        #[arg(long, conflicts_with_all = ["student", "course", "item"], required_unless_present = "item")]
        record: Option<ProgressId>,
        #[arg(long, requires_all = ["course", "item"])]
        student: Option<StudentId>,
        #[arg(long, requires = "item")]
        course: Option<CourseId>,
        /// `module:<id>`, `assignment:<id>`, `quiz:<id>`, `video:<ref>`, `pdf:<ref>` or `reading:<ref>`
        #[arg(long, value_parser = parse_item, requires_all = ["student", "course"])]
        item: Option<TrackedItem>,
    },
    /// Report progress on a record
    Update {
        record: ProgressId,
        #[arg(long, allow_hyphen_values = true)]
        percent: i32,
        #[arg(long, default_value = "0")]
        minutes: u32,
    },
    /// Complete a record, optionally with a score
    Complete {
        record: ProgressId,
        #[arg(long, allow_hyphen_values = true)]
        score: Option<f64>,
        #[arg(long, default_value = "0")]
        minutes: u32,
    },
    /// Flag every past-due incomplete record as overdue
    RefreshOverdue,
    /// Course rollup for one student
    Progress {
        #[arg(long)]
        student: StudentId,
        #[arg(long)]
        course: CourseId,
    },
    /// Per-item summaries for one student in a course
    Items {
        #[arg(long)]
        student: StudentId,
        #[arg(long)]
        course: CourseId,
    },
    /// Past-due items across a student's courses
    Overdue {
        #[arg(long)]
        student: StudentId,
    },
    /// Items due soon across a student's courses
    Upcoming {
        #[arg(long)]
        student: StudentId,
        #[arg(long)]
        days: Option<u32>,
    },
    /// Cross-student statistics for a course
    Stats {
        #[arg(long)]
        course: CourseId,
    },
    /// Student overview
    Dashboard {
        #[arg(long)]
        student: StudentId,
    },
}

fn parse_now(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp {raw}: {e}"))
}

fn parse_item(raw: &str) -> Result<TrackedItem, String> {
    let (kind, key) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected <kind>:<id>, got {raw}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing item key in {raw}"));
    }

    let content = |content: ContentKind| TrackedItem::Content {
        content,
        reference: key.to_string(),
    };
    match kind.trim() {
        "module" => Ok(TrackedItem::Module {
            module_id: key.parse().map_err(|e: learn_core::model::ParseIdError| e.to_string())?,
        }),
        "assignment" => Ok(TrackedItem::Assignment {
            assignment_id: key.parse().map_err(|e: learn_core::model::ParseIdError| e.to_string())?,
        }),
        "quiz" => Ok(TrackedItem::Quiz {
            quiz_id: key.parse().map_err(|e: learn_core::model::ParseIdError| e.to_string())?,
        }),
        "video" => Ok(content(ContentKind::Video)),
        "pdf" => Ok(content(ContentKind::Pdf)),
        "reading" => Ok(content(ContentKind::Reading)),
        other => Err(format!("unknown item kind: {other}")),
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    let trimmed = raw.trim().to_string();
    if trimmed == "sqlite::memory:"
        || trimmed.starts_with("sqlite://")
        || trimmed.starts_with("sqlite:file:")
    {
        return trimmed;
    }

    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file and its parent directory so the pool can open it.
fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        // In-memory and `sqlite:file:` URLs need no file on disk.
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid --db value: {db_url}");
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }

    Ok(())
}

fn due_in(clock: Clock, days: i64) -> Result<DateTime<Utc>> {
    let Some(due) = clock.days_from_now(days) else {
        bail!("--due-in-days {days} is out of range");
    };
    Ok(due)
}

fn demo_course(
    title: String,
    modules: u32,
    assignments: u32,
    due_date: DateTime<Utc>,
    max_score: f64,
    quiz_points: Vec<f64>,
) -> CourseItems {
    let mut course = CourseItems::empty(CourseId::new(), title);
    course.modules = (0..modules)
        .map(|order| CourseModule {
            id: ModuleId::new(),
            title: format!("Module {}", order + 1),
            order,
        })
        .collect();
    course.assignments = (0..assignments)
        .map(|n| CourseAssignment {
            id: AssignmentId::new(),
            title: format!("Assignment {}", n + 1),
            due_date: Some(due_date),
            max_score: Some(max_score),
        })
        .collect();
    if !quiz_points.is_empty() {
        course.quizzes.push(CourseQuiz {
            id: QuizId::new(),
            title: "Quiz 1".into(),
            question_points: quiz_points,
        });
    }
    course
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ProgressConfig::from_env();
    config.database_url = normalize_sqlite_url(cli.db.unwrap_or(config.database_url));
    if let Some(days) = cli.window_days {
        config.upcoming_window_days = days;
    }
    let clock = Clock::from_override(cli.now);

    // Open + migrate SQLite here so services stay storage-agnostic.
    prepare_sqlite_file(&config.database_url)?;
    info!(db = %config.database_url, fixed_clock = clock.is_fixed(), "opening progress store");
    let app = AppServices::new_sqlite(clock, config.clone())
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    let progress = app.progress();

    match cli.command {
        Commands::Migrate => {
            print_json(&json!({ "database_url": config.database_url, "migrated": true }))?;
        }
        Commands::SeedCourse {
            title,
            modules,
            assignments,
            due_in_days,
            max_score,
            quiz_points,
            no_quiz,
        } => {
            let due_date = due_in(clock, due_in_days)?;
            let quiz_points = if no_quiz { Vec::new() } else { quiz_points };
            let course = demo_course(title, modules, assignments, due_date, max_score, quiz_points);
            app.storage().courses.upsert_course(&course).await?;
            print_json(&course)?;
        }
        Commands::Enroll { student, course } => {
            let enrollment = progress.enroll_student(student, course).await?;
            print_json(&enrollment)?;
        }
        Commands::Init { student, course } => {
            let initialized = progress.initialize_student_progress(student, course).await?;
            print_json(&json!({ "initialized": initialized }))?;
        }
        Commands::Start {
            record,
            student,
            course,
            item,
        } => {
            let started = match (record, student, course, item) {
                (Some(record), ..) => progress.mark_started(record).await?,
                (None, Some(student), Some(course), Some(item)) => {
                    progress.start_item(student, course, &item).await?
                }
                _ => bail!("start needs --record or --student, --course and --item"),
            };
            print_json(&started)?;
        }
        Commands::Update {
            record,
            percent,
            minutes,
        } => {
            let updated = progress.update_progress(record, percent, minutes).await?;
            print_json(&updated)?;
        }
        Commands::Complete {
            record,
            score,
            minutes,
        } => {
            let completed = progress.mark_completed(record, score, minutes).await?;
            print_json(&completed)?;
        }
        Commands::RefreshOverdue => {
            let changed = progress.refresh_overdue().await?;
            print_json(&json!({ "changed": changed }))?;
        }
        Commands::Progress { student, course } => {
            print_json(&progress.course_progress(student, course).await?)?;
        }
        Commands::Items { student, course } => {
            print_json(&progress.record_summaries(student, course).await?)?;
        }
        Commands::Overdue { student } => {
            print_json(&progress.overdue_items(student).await?)?;
        }
        Commands::Upcoming { student, days } => {
            print_json(&progress.upcoming_deadlines(student, days).await?)?;
        }
        Commands::Stats { course } => {
            print_json(&progress.course_statistics(course).await?)?;
        }
        Commands::Dashboard { student } => {
            print_json(&progress.student_dashboard(student).await?)?;
        }
    }

    Ok(())
}
