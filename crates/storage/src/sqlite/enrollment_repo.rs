use learn_core::model::{CourseId, Enrollment, StudentId};

use super::{
    SqliteRepository,
    mapping::{map_enrollment_row, read_err, write_err},
};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO enrollments (
                    id, student_id, course_id, enrolled_at, progress, completed
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(enrollment.id.to_string())
        .bind(enrollment.student_id.to_string())
        .bind(enrollment.course_id.to_string())
        .bind(enrollment.enrolled_at)
        .bind(i64::from(enrollment.progress))
        .bind(i64::from(enrollment.completed))
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn get_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, student_id, course_id, enrolled_at, progress, completed
                FROM enrollments
                WHERE student_id = ?1 AND course_id = ?2
            ",
        )
        .bind(student_id.to_string())
        .bind(course_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE enrollments
                SET progress = ?2, completed = ?3
                WHERE id = ?1
            ",
        )
        .bind(enrollment.id.to_string())
        .bind(i64::from(enrollment.progress))
        .bind(i64::from(enrollment.completed))
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_enrollments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, student_id, course_id, enrolled_at, progress, completed
                FROM enrollments
                WHERE student_id = ?1
                ORDER BY enrolled_at ASC, rowid ASC
            ",
        )
        .bind(student_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_enrollment_row).collect()
    }
}
