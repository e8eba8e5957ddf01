pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

pub use error::DbError;
pub use rusqlite::{Connection, Transaction};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default bound on how long a caller waits for the store lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(3);

/// Persistence gateway. Every read and write goes through one exclusive,
/// time-bounded lock around a single connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    lock_timeout: Duration,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;

        // WAL mode so external readers (sqlite3 shell, backups) don't block us
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::from_connection(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Run `f` inside one transaction while holding the store lock.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back otherwise.
    /// The lock is released on every exit path, including a panic inside `f`.
    /// Fails with [`DbError::LockTimeout`] when the lock is not acquired within
    /// the configured bound.
    pub async fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DbError> + Send + 'static,
    {
        let guard = tokio::time::timeout(self.lock_timeout, self.conn.clone().lock_owned())
            .await
            .map_err(|_| DbError::LockTimeout(self.lock_timeout))?;

        // rusqlite is blocking, keep it off the async workers
        tokio::task::spawn_blocking(move || -> Result<T, E> {
            let mut conn = guard;
            let tx = conn.transaction().map_err(DbError::from)?;
            let value = f(&tx)?;
            tx.commit().map_err(DbError::from)?;
            debug!("transaction committed");
            Ok(value)
        })
        .await
        .map_err(|e| DbError::Join(e.to_string()))?
    }
}
