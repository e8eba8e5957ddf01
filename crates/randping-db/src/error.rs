use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Timed out after {0:?} waiting for the database lock")]
    LockTimeout(Duration),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database task failed: {0}")]
    Join(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}
