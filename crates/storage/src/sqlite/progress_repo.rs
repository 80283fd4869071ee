use chrono::{DateTime, Utc};
use learn_core::model::{CourseId, ProgressId, ProgressRecord, ProgressStatus, StudentId, TrackedItem};
use sqlx::{Sqlite, Transaction};

use super::{
    SqliteRepository,
    mapping::{item_columns, map_progress_row, read_err, ser, write_err},
};
use crate::repository::{ProgressRepository, StorageError};

const SELECT_COLUMNS: &str = r"
    SELECT
        id, student_id, course_id, item_type, module_id, assignment_id, quiz_id, content_ref,
        status, progress_percentage, time_spent_minutes, started_at, completed_at,
        last_accessed, due_date, score, max_score, metadata, created_at, updated_at
    FROM progress_records
";

fn metadata_json(record: &ProgressRecord) -> Result<String, StorageError> {
    serde_json::to_string(record.metadata()).map_err(ser)
}

async fn insert_one(
    tx: &mut Transaction<'_, Sqlite>,
    record: &ProgressRecord,
) -> Result<(), StorageError> {
    let (module_id, assignment_id, quiz_id, content_ref) = item_columns(record.item());

    sqlx::query(
        r"
            INSERT INTO progress_records (
                id, student_id, course_id, item_type, item_key,
                module_id, assignment_id, quiz_id, content_ref,
                status, progress_percentage, time_spent_minutes,
                started_at, completed_at, last_accessed, due_date,
                score, max_score, metadata, created_at, updated_at
            )
            VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21
            )
        ",
    )
    .bind(record.id().to_string())
    .bind(record.student_id().to_string())
    .bind(record.course_id().to_string())
    .bind(record.item_type().as_str())
    .bind(record.item().item_key())
    .bind(module_id)
    .bind(assignment_id)
    .bind(quiz_id)
    .bind(content_ref)
    .bind(record.status().as_str())
    .bind(i64::from(record.progress_percentage()))
    .bind(i64::from(record.time_spent_minutes()))
    .bind(record.started_at())
    .bind(record.completed_at())
    .bind(record.last_accessed())
    .bind(record.due_date())
    .bind(record.score())
    .bind(record.max_score())
    .bind(metadata_json(record)?)
    .bind(record.created_at())
    .bind(record.updated_at())
    .execute(&mut **tx)
    .await
    .map_err(write_err)?;

    Ok(())
}

impl SqliteRepository {
    async fn fetch_records(
        &self,
        filter: &str,
        binds: &[String],
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE {filter} ORDER BY rowid ASC");
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value.as_str());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(read_err)?;
        rows.iter().map(map_progress_row).collect()
    }
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn insert_batch(&self, records: &[ProgressRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(read_err)?;
        for record in records {
            // Dropping the transaction on error rolls back the partial batch.
            insert_one(&mut tx, record).await?;
        }
        tx.commit().await.map_err(write_err)?;

        tracing::debug!(count = records.len(), "inserted progress records");
        Ok(())
    }

    async fn get_record(&self, id: ProgressId) -> Result<Option<ProgressRecord>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn update_record(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE progress_records
                SET status = ?2,
                    progress_percentage = ?3,
                    time_spent_minutes = ?4,
                    started_at = ?5,
                    completed_at = ?6,
                    last_accessed = ?7,
                    due_date = ?8,
                    score = ?9,
                    max_score = ?10,
                    metadata = ?11,
                    updated_at = ?12
                WHERE id = ?1
            ",
        )
        .bind(record.id().to_string())
        .bind(record.status().as_str())
        .bind(i64::from(record.progress_percentage()))
        .bind(i64::from(record.time_spent_minutes()))
        .bind(record.started_at())
        .bind(record.completed_at())
        .bind(record.last_accessed())
        .bind(record.due_date())
        .bind(record.score())
        .bind(record.max_score())
        .bind(metadata_json(record)?)
        .bind(record.updated_at())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn find_by_item(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        item: &TrackedItem,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE student_id = ?1 AND course_id = ?2 AND item_type = ?3 AND item_key = ?4"
        );
        let row = sqlx::query(&sql)
            .bind(student_id.to_string())
            .bind(course_id.to_string())
            .bind(item.item_type().as_str())
            .bind(item.item_key())
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn list_for_student_course(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.fetch_records(
            "student_id = ?1 AND course_id = ?2",
            &[student_id.to_string(), course_id.to_string()],
        )
        .await
    }

    async fn has_records(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            r"
                SELECT 1 FROM progress_records
                WHERE student_id = ?1 AND course_id = ?2
                LIMIT 1
            ",
        )
        .bind(student_id.to_string())
        .bind(course_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        Ok(row.is_some())
    }

    async fn list_for_course(
        &self,
        course_id: CourseId,
        status: Option<ProgressStatus>,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        match status {
            Some(status) => {
                self.fetch_records(
                    "course_id = ?1 AND status = ?2",
                    &[course_id.to_string(), status.as_str().to_string()],
                )
                .await
            }
            None => self.fetch_records("course_id = ?1", &[course_id.to_string()]).await,
        }
    }

    async fn list_for_student(
        &self,
        student_id: StudentId,
        status: Option<ProgressStatus>,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        match status {
            Some(status) => {
                self.fetch_records(
                    "student_id = ?1 AND status = ?2",
                    &[student_id.to_string(), status.as_str().to_string()],
                )
                .await
            }
            None => {
                self.fetch_records("student_id = ?1", &[student_id.to_string()])
                    .await
            }
        }
    }

    async fn list_due_before(
        &self,
        before: DateTime<Utc>,
        statuses: &[ProgressStatus],
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (0..statuses.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "{SELECT_COLUMNS} WHERE due_date IS NOT NULL AND due_date < ?1 AND status IN ({placeholders}) ORDER BY due_date ASC, rowid ASC"
        );

        let mut query = sqlx::query(&sql).bind(before);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(read_err)?;
        rows.iter().map(map_progress_row).collect()
    }
}
