use chrono::{DateTime, Utc};
use learn_core::model::{
    ContentKind, Enrollment, ItemType, PersistedProgress, ProgressRecord, ProgressStatus,
    TrackedItem,
};
use serde_json::{Map, Value};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::str::FromStr;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps write failures, surfacing unique-constraint hits as `Conflict`.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn read_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn parse_id<T>(field: &'static str, raw: &str) -> Result<T, StorageError>
where
    T: FromStr,
{
    raw.parse::<T>()
        .map_err(|_| StorageError::Serialization(format!("invalid {field}: {raw}")))
}

fn get_id<T: FromStr>(row: &SqliteRow, field: &'static str) -> Result<T, StorageError> {
    let raw: String = row.try_get(field).map_err(ser)?;
    parse_id(field, &raw)
}

fn get_opt_id<T: FromStr>(row: &SqliteRow, field: &'static str) -> Result<Option<T>, StorageError> {
    let raw: Option<String> = row.try_get(field).map_err(ser)?;
    raw.map(|r| parse_id(field, &r)).transpose()
}

pub(crate) fn parse_item_type(s: &str) -> Result<ItemType, StorageError> {
    match s {
        "module" => Ok(ItemType::Module),
        "assignment" => Ok(ItemType::Assignment),
        "quiz" => Ok(ItemType::Quiz),
        "video" => Ok(ItemType::Video),
        "pdf" => Ok(ItemType::Pdf),
        "reading" => Ok(ItemType::Reading),
        _ => Err(StorageError::Serialization(format!("invalid item_type: {s}"))),
    }
}

pub(crate) fn parse_status(s: &str) -> Result<ProgressStatus, StorageError> {
    match s {
        "not_started" => Ok(ProgressStatus::NotStarted),
        "in_progress" => Ok(ProgressStatus::InProgress),
        "completed" => Ok(ProgressStatus::Completed),
        "overdue" => Ok(ProgressStatus::Overdue),
        _ => Err(StorageError::Serialization(format!("invalid status: {s}"))),
    }
}

/// Column values for the tracked item: (module_id, assignment_id, quiz_id, content_ref).
pub(crate) fn item_columns(
    item: &TrackedItem,
) -> (Option<String>, Option<String>, Option<String>, Option<String>) {
    match item {
        TrackedItem::Module { module_id } => (Some(module_id.to_string()), None, None, None),
        TrackedItem::Assignment { assignment_id } => {
            (None, Some(assignment_id.to_string()), None, None)
        }
        TrackedItem::Quiz { quiz_id } => (None, None, Some(quiz_id.to_string()), None),
        TrackedItem::Content { reference, .. } => (None, None, None, Some(reference.clone())),
    }
}

fn missing(field: &'static str) -> StorageError {
    StorageError::Serialization(format!("missing {field}"))
}

fn map_tracked_item(row: &SqliteRow, item_type: ItemType) -> Result<TrackedItem, StorageError> {
    let content = |content: ContentKind| -> Result<TrackedItem, StorageError> {
        let reference: Option<String> = row.try_get("content_ref").map_err(ser)?;
        Ok(TrackedItem::Content {
            content,
            reference: reference.ok_or_else(|| missing("content_ref"))?,
        })
    };

    match item_type {
        ItemType::Module => Ok(TrackedItem::Module {
            module_id: get_opt_id(row, "module_id")?.ok_or_else(|| missing("module_id"))?,
        }),
        ItemType::Assignment => Ok(TrackedItem::Assignment {
            assignment_id: get_opt_id(row, "assignment_id")?
                .ok_or_else(|| missing("assignment_id"))?,
        }),
        ItemType::Quiz => Ok(TrackedItem::Quiz {
            quiz_id: get_opt_id(row, "quiz_id")?.ok_or_else(|| missing("quiz_id"))?,
        }),
        ItemType::Video => content(ContentKind::Video),
        ItemType::Pdf => content(ContentKind::Pdf),
        ItemType::Reading => content(ContentKind::Reading),
    }
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let item_type = parse_item_type(&row.try_get::<String, _>("item_type").map_err(ser)?)?;
    let status = parse_status(&row.try_get::<String, _>("status").map_err(ser)?)?;

    let pct_i64: i64 = row.try_get("progress_percentage").map_err(ser)?;
    let progress_percentage = u8::try_from(pct_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid progress_percentage: {pct_i64}")))?;

    let minutes_i64: i64 = row.try_get("time_spent_minutes").map_err(ser)?;
    let time_spent_minutes = u32::try_from(minutes_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid time_spent_minutes: {minutes_i64}")))?;

    let metadata_raw: String = row.try_get("metadata").map_err(ser)?;
    let metadata: Map<String, Value> = serde_json::from_str(&metadata_raw).map_err(ser)?;

    let started_at: Option<DateTime<Utc>> = row.try_get("started_at").map_err(ser)?;
    let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at").map_err(ser)?;
    let last_accessed: Option<DateTime<Utc>> = row.try_get("last_accessed").map_err(ser)?;
    let due_date: Option<DateTime<Utc>> = row.try_get("due_date").map_err(ser)?;

    ProgressRecord::from_persisted(PersistedProgress {
        id: get_id(row, "id")?,
        student_id: get_id(row, "student_id")?,
        course_id: get_id(row, "course_id")?,
        item: map_tracked_item(row, item_type)?,
        status,
        progress_percentage,
        time_spent_minutes,
        started_at,
        completed_at,
        last_accessed,
        due_date,
        score: row.try_get("score").map_err(ser)?,
        max_score: row.try_get("max_score").map_err(ser)?,
        metadata,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
    .map_err(ser)
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let progress_i64: i64 = row.try_get("progress").map_err(ser)?;
    let progress = u32::try_from(progress_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid progress: {progress_i64}")))?;
    let completed: i64 = row.try_get("completed").map_err(ser)?;

    Ok(Enrollment {
        id: get_id(row, "id")?,
        student_id: get_id(row, "student_id")?,
        course_id: get_id(row, "course_id")?,
        enrolled_at: row.try_get("enrolled_at").map_err(ser)?,
        progress,
        completed: completed != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::ModuleId;

    #[test]
    fn item_type_strings_round_trip() {
        for t in [
            ItemType::Module,
            ItemType::Assignment,
            ItemType::Quiz,
            ItemType::Video,
            ItemType::Pdf,
            ItemType::Reading,
        ] {
            assert_eq!(parse_item_type(t.as_str()).unwrap(), t);
        }
        assert!(parse_item_type("podcast").is_err());
    }

    #[test]
    fn status_strings_round_trip() {
        for s in [
            ProgressStatus::NotStarted,
            ProgressStatus::InProgress,
            ProgressStatus::Completed,
            ProgressStatus::Overdue,
        ] {
            assert_eq!(parse_status(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn item_columns_set_exactly_one_slot() {
        let module_id = ModuleId::new();
        let cols = item_columns(&TrackedItem::Module { module_id });
        assert_eq!(cols, (Some(module_id.to_string()), None, None, None));

        let cols = item_columns(&TrackedItem::Content {
            content: ContentKind::Pdf,
            reference: "syllabus.pdf".into(),
        });
        assert_eq!(cols, (None, None, None, Some("syllabus.pdf".to_string())));
    }
}
