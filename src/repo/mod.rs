pub mod availability;
pub mod doctors;
pub mod sessions;
pub mod users;

#[cfg(test)]
pub mod memory;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// A unique constraint rejected the write; carries the constraint name.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    /// A foreign key pointed at a row that does not exist (or was just deleted).
    #[error("foreign key violated: {0}")]
    MissingReference(String),
    #[error("db error: {0}")]
    Db(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            if db.is_unique_violation() {
                return RepoError::Conflict(constraint);
            }
            if db.is_foreign_key_violation() {
                return RepoError::MissingReference(constraint);
            }
        }
        RepoError::Db(e)
    }
}
