use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::RepoError;
use crate::models::{Role, SessionTokenRow};

/// An unexpired, unrevoked session together with its owner's current role.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActiveSession {
    pub session_token_id: Uuid,
    pub user_id: i64,
    pub role: Role,
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionTokenRow, RepoError>;
    /// Resolve a token hash to its live session and bump `last_seen_at`.
    async fn lookup_active(&self, token_hash: &str) -> Result<Option<ActiveSession>, RepoError>;
    async fn revoke(&self, session_token_id: Uuid) -> Result<bool, RepoError>;
    /// Revoke every live session of `user_id` except `keep`.
    async fn revoke_others(&self, user_id: i64, keep: Uuid) -> Result<u64, RepoError>;
}

pub struct PgSessionsRepo {
    db: PgPool,
}

impl PgSessionsRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionsRepo for PgSessionsRepo {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionTokenRow, RepoError> {
        let row = sqlx::query_as::<_, SessionTokenRow>(
            r#"
            INSERT INTO session_token (user_id, session_token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING session_token_id, expires_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;

        Ok(row)
    }

    async fn lookup_active(&self, token_hash: &str) -> Result<Option<ActiveSession>, RepoError> {
        let row = sqlx::query_as::<_, ActiveSession>(
            r#"
            SELECT st.session_token_id, st.user_id, u.role
            FROM session_token st
            JOIN users u ON u.id = st.user_id
            WHERE st.session_token_hash = $1
              AND st.revoked_at IS NULL
              AND st.expires_at > now()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await?;

        if let Some(session) = &row {
            // best-effort
            if let Err(e) = sqlx::query(
                r#"
                UPDATE session_token
                SET last_seen_at = now()
                WHERE session_token_id = $1
                "#,
            )
            .bind(session.session_token_id)
            .execute(&self.db)
            .await
            {
                tracing::warn!(error = %e, "failed to touch session last_seen_at");
            }
        }

        Ok(row)
    }

    async fn revoke(&self, session_token_id: Uuid) -> Result<bool, RepoError> {
        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE session_token_id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(session_token_id)
        .execute(&self.db)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn revoke_others(&self, user_id: i64, keep: Uuid) -> Result<u64, RepoError> {
        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE user_id = $1
              AND revoked_at IS NULL
              AND expires_at > now()
              AND session_token_id <> $2
            "#,
        )
        .bind(user_id)
        .bind(keep)
        .execute(&self.db)
        .await?;

        Ok(res.rows_affected())
    }
}
