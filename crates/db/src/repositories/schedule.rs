use chrono::Utc;
use sqlx::Row;
use tracing::debug;

use courseplan_core::domain::course::{Course, CourseKey, Weekday};
use courseplan_core::schedule::{ScheduleSnapshot, SlotAssignment};

use super::{RepositoryError, ScheduleRepository};
use crate::DbPool;

pub struct SqlScheduleRepository {
    pool: DbPool,
}

impl SqlScheduleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_course(row: &sqlx::sqlite::SqliteRow) -> Result<Course, RepositoryError> {
    let payload: String =
        row.try_get("payload").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    serde_json::from_str(&payload).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_assignment(row: &sqlx::sqlite::SqliteRow) -> Result<SlotAssignment, RepositoryError> {
    let day: i64 = row.try_get("day").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let period: i64 = row.try_get("period").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let code: String = row.try_get("code").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let serial: String =
        row.try_get("serial").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let day = u8::try_from(day)
        .ok()
        .and_then(Weekday::from_number)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid weekday `{day}`")))?;
    let period = u8::try_from(period)
        .map_err(|_| RepositoryError::Decode(format!("invalid period `{period}`")))?;

    Ok(SlotAssignment { day, period, key: CourseKey::new(code, serial) })
}

#[async_trait::async_trait]
impl ScheduleRepository for SqlScheduleRepository {
    async fn save(&self, snapshot: &ScheduleSnapshot) -> Result<(), RepositoryError> {
        let saved_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM slot_assignment").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM selected_course").execute(&mut *tx).await?;

        for (ordinal, course) in snapshot.selection.iter().enumerate() {
            let payload =
                serde_json::to_string(course).map_err(|e| RepositoryError::Decode(e.to_string()))?;
            sqlx::query(
                "INSERT INTO selected_course (ordinal, code, serial, payload, saved_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(ordinal as i64)
            .bind(&course.code)
            .bind(&course.serial)
            .bind(payload)
            .bind(&saved_at)
            .execute(&mut *tx)
            .await?;
        }

        for assignment in &snapshot.occupancy {
            sqlx::query(
                "INSERT INTO slot_assignment (day, period, code, serial)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(day, period) DO UPDATE SET
                     code = excluded.code,
                     serial = excluded.serial",
            )
            .bind(i64::from(assignment.day.number()))
            .bind(i64::from(assignment.period))
            .bind(&assignment.key.code)
            .bind(&assignment.key.serial)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            event_name = "persistence.snapshot_saved",
            courses = snapshot.selection.len(),
            slots = snapshot.occupancy.len(),
            "schedule snapshot saved"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<ScheduleSnapshot>, RepositoryError> {
        let course_rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query("SELECT payload FROM selected_course ORDER BY ordinal ASC")
                .fetch_all(&self.pool)
                .await?;
        let slot_rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT day, period, code, serial FROM slot_assignment ORDER BY day ASC, period ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        if course_rows.is_empty() && slot_rows.is_empty() {
            return Ok(None);
        }

        let selection = course_rows.iter().map(row_to_course).collect::<Result<Vec<_>, _>>()?;
        let occupancy =
            slot_rows.iter().map(row_to_assignment).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(ScheduleSnapshot { selection, occupancy }))
    }
}
