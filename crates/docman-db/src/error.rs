//! Database error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Cannot delete the last master account")]
    LastMaster,
}

impl DbError {
    /// Map a sqlx error, turning UNIQUE constraint violations into `Duplicate`
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::Duplicate(what.to_string())
            }
            _ => DbError::Connection(err),
        }
    }
}
