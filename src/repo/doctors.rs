use async_trait::async_trait;
use sqlx::{PgPool, QueryBuilder};

use super::RepoError;
use crate::models::{DoctorFilter, DoctorPatch, DoctorRow, DoctorStats, NewDoctor};

#[async_trait]
pub trait DoctorsRepo: Send + Sync {
    /// Newest first; filters combine with AND.
    async fn list(&self, filter: &DoctorFilter) -> Result<Vec<DoctorRow>, RepoError>;
    async fn find(&self, id: i64) -> Result<Option<DoctorRow>, RepoError>;
    async fn exists(&self, id: i64) -> Result<bool, RepoError>;
    /// Id of a doctor (other than `exclude_id`) already holding `email` or `license_number`.
    async fn find_conflicting(
        &self,
        email: Option<&str>,
        license_number: Option<&str>,
        exclude_id: Option<i64>,
    ) -> Result<Option<i64>, RepoError>;
    async fn insert(&self, doctor: NewDoctor) -> Result<DoctorRow, RepoError>;
    async fn update(&self, id: i64, patch: DoctorPatch) -> Result<Option<DoctorRow>, RepoError>;
    /// Availability rows go with the doctor.
    async fn delete(&self, id: i64) -> Result<bool, RepoError>;
    async fn stats(&self) -> Result<DoctorStats, RepoError>;
}

pub struct PgDoctorsRepo {
    db: PgPool,
}

impl PgDoctorsRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const DOCTOR_COLUMNS: &str = r#"
    id, name, email, phone, specialization, license_number, address,
    profile_image, status, primary_clinic, created_at, updated_at
"#;

#[async_trait]
impl DoctorsRepo for PgDoctorsRepo {
    async fn list(&self, filter: &DoctorFilter) -> Result<Vec<DoctorRow>, RepoError> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new("SELECT ");
        qb.push(DOCTOR_COLUMNS);
        qb.push(" FROM doctors WHERE 1=1 ");

        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        if let Some(specialization) = filter.specialization.as_deref() {
            qb.push(" AND specialization = ");
            qb.push_bind(specialization.to_string());
        }
        if let Some(search) = filter.search.as_deref() {
            let like = format!("%{}%", escape_like(search));
            qb.push(" AND (name ILIKE ");
            qb.push_bind(like.clone());
            qb.push(" OR email ILIKE ");
            qb.push_bind(like.clone());
            qb.push(" OR specialization ILIKE ");
            qb.push_bind(like);
            qb.push(") ");
        }

        qb.push(" ORDER BY created_at DESC, id DESC ");

        let rows = qb.build_query_as::<DoctorRow>().fetch_all(&self.db).await?;
        Ok(rows)
    }

    async fn find(&self, id: i64) -> Result<Option<DoctorRow>, RepoError> {
        let sql = format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = $1");
        let row = sqlx::query_as::<_, DoctorRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn exists(&self, id: i64) -> Result<bool, RepoError> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM doctors WHERE id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(found)
    }

    async fn find_conflicting(
        &self,
        email: Option<&str>,
        license_number: Option<&str>,
        exclude_id: Option<i64>,
    ) -> Result<Option<i64>, RepoError> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM doctors
            WHERE (email = $1 OR license_number = $2)
              AND ($3::BIGINT IS NULL OR id <> $3)
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(license_number)
        .bind(exclude_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(id)
    }

    async fn insert(&self, doctor: NewDoctor) -> Result<DoctorRow, RepoError> {
        let sql = format!(
            r#"
            INSERT INTO doctors
                (name, email, phone, specialization, license_number,
                 address, profile_image, status, primary_clinic)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {DOCTOR_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DoctorRow>(&sql)
            .bind(&doctor.name)
            .bind(&doctor.email)
            .bind(doctor.phone.as_deref())
            .bind(&doctor.specialization)
            .bind(&doctor.license_number)
            .bind(doctor.address.as_deref())
            .bind(doctor.profile_image.as_deref())
            .bind(doctor.status)
            .bind(&doctor.primary_clinic)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn update(&self, id: i64, patch: DoctorPatch) -> Result<Option<DoctorRow>, RepoError> {
        let sql = format!(
            r#"
            UPDATE doctors
            SET name = COALESCE($1, name),
                email = COALESCE($2, email),
                phone = COALESCE($3, phone),
                specialization = COALESCE($4, specialization),
                license_number = COALESCE($5, license_number),
                address = COALESCE($6, address),
                profile_image = COALESCE($7, profile_image),
                status = COALESCE($8, status),
                primary_clinic = COALESCE($9, primary_clinic),
                updated_at = now()
            WHERE id = $10
            RETURNING {DOCTOR_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DoctorRow>(&sql)
            .bind(patch.name)
            .bind(patch.email)
            .bind(patch.phone)
            .bind(patch.specialization)
            .bind(patch.license_number)
            .bind(patch.address)
            .bind(patch.profile_image)
            .bind(patch.status)
            .bind(patch.primary_clinic)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        // ON DELETE CASCADE removes availability and appointments.
        let res = sqlx::query(
            r#"
            DELETE FROM doctors
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn stats(&self) -> Result<DoctorStats, RepoError> {
        let stats = sqlx::query_as::<_, DoctorStats>(
            r#"
            SELECT
                COUNT(*) AS total_doctors,
                COUNT(*) FILTER (WHERE status = 'Active') AS active_doctors,
                COUNT(*) FILTER (WHERE status = 'Inactive') AS inactive_doctors,
                COUNT(DISTINCT specialization) AS total_specializations
            FROM doctors
            "#,
        )
        .fetch_one(&self.db)
        .await?;
        Ok(stats)
    }
}

/// Escape LIKE metacharacters so user search text matches literally.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
