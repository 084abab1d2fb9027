use async_trait::async_trait;
use sqlx::{PgPool, QueryBuilder};

use super::RepoError;
use crate::models::{
    AvailabilityFilter, AvailabilityListRow, AvailabilityRow, DayOfWeek, TimeWindow,
};

/// Outcome of an upsert keyed on (doctor_id, day_of_week).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Upserted {
    #[sqlx(flatten)]
    pub row: AvailabilityRow,
    /// `true` when a new row was inserted, `false` when an existing one was updated.
    #[sqlx(rename = "inserted")]
    pub created: bool,
}

#[async_trait]
pub trait AvailabilityRepo: Send + Sync {
    /// Doctor's schedule, Monday first.
    async fn list_for_doctor(&self, doctor_id: i64) -> Result<Vec<AvailabilityRow>, RepoError>;
    /// All schedules joined with doctor name, ordered by doctor name then day.
    async fn list(&self, filter: &AvailabilityFilter)
        -> Result<Vec<AvailabilityListRow>, RepoError>;
    async fn find(&self, id: i64) -> Result<Option<AvailabilityRow>, RepoError>;
    /// Insert or overwrite the single row for (doctor_id, day). The row id survives updates.
    async fn upsert(
        &self,
        doctor_id: i64,
        day: DayOfWeek,
        window: &TimeWindow,
    ) -> Result<Upserted, RepoError>;
    async fn update(
        &self,
        id: i64,
        day: DayOfWeek,
        window: &TimeWindow,
    ) -> Result<Option<AvailabilityRow>, RepoError>;
    async fn delete(&self, id: i64) -> Result<bool, RepoError>;
}

pub struct PgAvailabilityRepo {
    db: PgPool,
}

impl PgAvailabilityRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AvailabilityRepo for PgAvailabilityRepo {
    async fn list_for_doctor(&self, doctor_id: i64) -> Result<Vec<AvailabilityRow>, RepoError> {
        let rows = sqlx::query_as::<_, AvailabilityRow>(
            r#"
            SELECT id, doctor_id, day_of_week, start_time, end_time, is_available,
                   created_at, updated_at
            FROM availability
            WHERE doctor_id = $1
            ORDER BY day_of_week
            "#,
        )
        .bind(doctor_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list(
        &self,
        filter: &AvailabilityFilter,
    ) -> Result<Vec<AvailabilityListRow>, RepoError> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT a.id, a.doctor_id, a.day_of_week, a.start_time, a.end_time,
                   a.is_available, a.created_at, a.updated_at,
                   d.name AS doctor_name, d.specialization
            FROM availability a
            JOIN doctors d ON d.id = a.doctor_id
            WHERE 1=1
            "#,
        );

        if let Some(doctor_id) = filter.doctor_id {
            qb.push(" AND a.doctor_id = ");
            qb.push_bind(doctor_id);
        }
        if let Some(day) = filter.day_of_week {
            qb.push(" AND a.day_of_week = ");
            qb.push_bind(day);
        }

        qb.push(" ORDER BY d.name, a.day_of_week ");

        let rows = qb
            .build_query_as::<AvailabilityListRow>()
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn find(&self, id: i64) -> Result<Option<AvailabilityRow>, RepoError> {
        let row = sqlx::query_as::<_, AvailabilityRow>(
            r#"
            SELECT id, doctor_id, day_of_week, start_time, end_time, is_available,
                   created_at, updated_at
            FROM availability
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn upsert(
        &self,
        doctor_id: i64,
        day: DayOfWeek,
        window: &TimeWindow,
    ) -> Result<Upserted, RepoError> {
        // Single statement: concurrent upserts for the same day resolve as
        // last-write-wins. xmax = 0 only on a freshly inserted tuple.
        let upserted = sqlx::query_as::<_, Upserted>(
            r#"
            INSERT INTO availability (doctor_id, day_of_week, start_time, end_time, is_available)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (doctor_id, day_of_week)
            DO UPDATE SET start_time = EXCLUDED.start_time,
                          end_time = EXCLUDED.end_time,
                          is_available = EXCLUDED.is_available,
                          updated_at = now()
            RETURNING id, doctor_id, day_of_week, start_time, end_time, is_available,
                      created_at, updated_at, (xmax = 0) AS inserted
            "#,
        )
        .bind(doctor_id)
        .bind(day)
        .bind(window.start_time)
        .bind(window.end_time)
        .bind(window.is_available)
        .fetch_one(&self.db)
        .await?;
        Ok(upserted)
    }

    async fn update(
        &self,
        id: i64,
        day: DayOfWeek,
        window: &TimeWindow,
    ) -> Result<Option<AvailabilityRow>, RepoError> {
        let row = sqlx::query_as::<_, AvailabilityRow>(
            r#"
            UPDATE availability
            SET day_of_week = $1,
                start_time = $2,
                end_time = $3,
                is_available = $4,
                updated_at = now()
            WHERE id = $5
            RETURNING id, doctor_id, day_of_week, start_time, end_time, is_available,
                      created_at, updated_at
            "#,
        )
        .bind(day)
        .bind(window.start_time)
        .bind(window.end_time)
        .bind(window.is_available)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let res = sqlx::query(
            r#"
            DELETE FROM availability
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
