use learn_core::model::{CourseAssignment, CourseId, CourseItems, CourseModule, CourseQuiz};
use sqlx::Row;
use std::collections::HashMap;

use super::{
    SqliteRepository,
    mapping::{parse_id, read_err, ser, write_err},
};
use crate::repository::{CourseCatalog, StorageError};

#[async_trait::async_trait]
impl CourseCatalog for SqliteRepository {
    async fn course_items(&self, course_id: CourseId) -> Result<Option<CourseItems>, StorageError> {
        let course_key = course_id.to_string();

        let Some(course) = sqlx::query("SELECT title FROM courses WHERE id = ?1")
            .bind(&course_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?
        else {
            return Ok(None);
        };
        let title: String = course.try_get("title").map_err(ser)?;

        let module_rows = sqlx::query(
            r"
                SELECT id, title, position
                FROM course_modules
                WHERE course_id = ?1
                ORDER BY position ASC, rowid ASC
            ",
        )
        .bind(&course_key)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        let mut modules = Vec::with_capacity(module_rows.len());
        for row in &module_rows {
            let raw_id: String = row.try_get("id").map_err(ser)?;
            let position: i64 = row.try_get("position").map_err(ser)?;
            modules.push(CourseModule {
                id: parse_id("module_id", &raw_id)?,
                title: row.try_get("title").map_err(ser)?,
                order: u32::try_from(position)
                    .map_err(|_| StorageError::Serialization(format!("invalid position: {position}")))?,
            });
        }

        let assignment_rows = sqlx::query(
            r"
                SELECT id, title, due_date, max_score
                FROM course_assignments
                WHERE course_id = ?1
                ORDER BY rowid ASC
            ",
        )
        .bind(&course_key)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        let mut assignments = Vec::with_capacity(assignment_rows.len());
        for row in &assignment_rows {
            let raw_id: String = row.try_get("id").map_err(ser)?;
            assignments.push(CourseAssignment {
                id: parse_id("assignment_id", &raw_id)?,
                title: row.try_get("title").map_err(ser)?,
                due_date: row.try_get("due_date").map_err(ser)?,
                max_score: row.try_get("max_score").map_err(ser)?,
            });
        }

        let question_rows = sqlx::query(
            r"
                SELECT q.quiz_id, q.points
                FROM quiz_questions q
                JOIN course_quizzes c ON c.id = q.quiz_id
                WHERE c.course_id = ?1
                ORDER BY q.quiz_id ASC, q.position ASC
            ",
        )
        .bind(&course_key)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        let mut points_by_quiz: HashMap<String, Vec<f64>> = HashMap::new();
        for row in &question_rows {
            let quiz_id: String = row.try_get("quiz_id").map_err(ser)?;
            let points: f64 = row.try_get("points").map_err(ser)?;
            points_by_quiz.entry(quiz_id).or_default().push(points);
        }

        let quiz_rows = sqlx::query(
            r"
                SELECT id, title
                FROM course_quizzes
                WHERE course_id = ?1
                ORDER BY rowid ASC
            ",
        )
        .bind(&course_key)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        let mut quizzes = Vec::with_capacity(quiz_rows.len());
        for row in &quiz_rows {
            let raw_id: String = row.try_get("id").map_err(ser)?;
            quizzes.push(CourseQuiz {
                id: parse_id("quiz_id", &raw_id)?,
                title: row.try_get("title").map_err(ser)?,
                question_points: points_by_quiz.remove(&raw_id).unwrap_or_default(),
            });
        }

        Ok(Some(CourseItems {
            course_id,
            title,
            modules,
            assignments,
            quizzes,
        }))
    }

    async fn upsert_course(&self, items: &CourseItems) -> Result<(), StorageError> {
        let course_key = items.course_id.to_string();
        let mut tx = self.pool.begin().await.map_err(read_err)?;

        sqlx::query(
            r"
                INSERT INTO courses (id, title)
                VALUES (?1, ?2)
                ON CONFLICT(id) DO UPDATE SET title = excluded.title
            ",
        )
        .bind(&course_key)
        .bind(&items.title)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        // Questions go with their quizzes via ON DELETE CASCADE.
        for table in ["course_modules", "course_assignments", "course_quizzes"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE course_id = ?1"))
                .bind(&course_key)
                .execute(&mut *tx)
                .await
                .map_err(write_err)?;
        }

        for module in &items.modules {
            sqlx::query(
                r"
                    INSERT INTO course_modules (id, course_id, title, position)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(module.id.to_string())
            .bind(&course_key)
            .bind(&module.title)
            .bind(i64::from(module.order))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        for assignment in &items.assignments {
            sqlx::query(
                r"
                    INSERT INTO course_assignments (id, course_id, title, due_date, max_score)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(assignment.id.to_string())
            .bind(&course_key)
            .bind(&assignment.title)
            .bind(assignment.due_date)
            .bind(assignment.max_score)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        for quiz in &items.quizzes {
            let quiz_key = quiz.id.to_string();
            sqlx::query(
                r"
                    INSERT INTO course_quizzes (id, course_id, title)
                    VALUES (?1, ?2, ?3)
                ",
            )
            .bind(&quiz_key)
            .bind(&course_key)
            .bind(&quiz.title)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

            for (position, points) in quiz.question_points.iter().enumerate() {
                let position = i64::try_from(position)
                    .map_err(|_| StorageError::Serialization("question position overflow".into()))?;
                sqlx::query(
                    r"
                        INSERT INTO quiz_questions (quiz_id, position, points)
                        VALUES (?1, ?2, ?3)
                    ",
                )
                .bind(&quiz_key)
                .bind(position)
                .bind(*points)
                .execute(&mut *tx)
                .await
                .map_err(write_err)?;
            }
        }

        tx.commit().await.map_err(write_err)?;
        tracing::debug!(course_id = %items.course_id, items = items.item_count(), "stored course");
        Ok(())
    }
}
