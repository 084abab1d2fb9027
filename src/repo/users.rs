use async_trait::async_trait;
use sqlx::PgPool;

use super::RepoError;
use crate::models::{NewUser, UserRow};

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<UserRow, RepoError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>, RepoError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRow>, RepoError>;
    /// Partial profile update; `None` keeps the stored value.
    async fn update_profile(
        &self,
        id: i64,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<UserRow>, RepoError>;
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, RepoError>;
}

pub struct PgUsersRepo {
    db: PgPool,
}

impl PgUsersRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsersRepo for PgUsersRepo {
    async fn insert(&self, user: NewUser) -> Result<UserRow, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, password, full_name, phone, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password, full_name, phone, role, created_at, updated_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.phone.as_deref())
        .bind(user.role)
        .fetch_one(&self.db)
        .await?;

        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password, full_name, phone, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRow>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password, full_name, phone, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn update_profile(
        &self,
        id: i64,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<UserRow>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET full_name = COALESCE($1, full_name),
                phone = COALESCE($2, phone),
                updated_at = now()
            WHERE id = $3
            RETURNING id, email, password, full_name, phone, role, created_at, updated_at
            "#,
        )
        .bind(full_name)
        .bind(phone)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, RepoError> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET password = $1,
                updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(res.rows_affected() > 0)
    }
}
