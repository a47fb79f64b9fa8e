use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{Connection, Handle};
use crate::error::BackendError;
use crate::results::ResultSet;

use super::config::SqliteOptions;
use super::prepared::SqliteHandle;
use super::query::build_result_set;

/// A single `SQLite` connection shared by every session that uses its id.
#[derive(Clone)]
pub struct SqliteConnection {
    conn: Arc<Mutex<rusqlite::Connection>>,
    db_path: Arc<str>,
}

impl SqliteConnection {
    /// Open the database named by `opts`.
    ///
    /// # Errors
    /// Returns `BackendError` if the database cannot be opened or the initial pragmas fail.
    pub fn open(opts: &SqliteOptions) -> Result<Self, BackendError> {
        let conn = rusqlite::Connection::open(&opts.db_path)?;
        if opts.wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        if let Some(timeout) = opts.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        tracing::debug!(path = %opts.db_path, wal = opts.wal, "opened sqlite connection");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Arc::from(opts.db_path.as_str()),
        })
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns `BackendError` if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, BackendError> {
        Self::open(&SqliteOptions::in_memory())
    }

    #[must_use]
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, rusqlite::Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn shared(&self) -> Arc<Mutex<rusqlite::Connection>> {
        Arc::clone(&self.conn)
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl Connection for SqliteConnection {
    fn prepare(&self, sql: &str) -> Result<Box<dyn Handle>, BackendError> {
        let params = {
            let guard = self.lock();
            let stmt = guard.prepare_cached(sql)?;
            (1..=stmt.parameter_count())
                .map(|idx| stmt.parameter_name(idx).map(str::to_string))
                .collect::<Vec<_>>()
        };
        Ok(Box::new(SqliteHandle::new(self.shared(), sql.to_string(), params)))
    }

    fn query(&self, sql: &str) -> Result<ResultSet, BackendError> {
        let guard = self.lock();
        let mut stmt = guard.prepare(sql)?;
        build_result_set(&mut stmt)
    }

    /// Rows changed by `sql` alone. `changes()` keeps the count of the last DML
    /// statement across DDL, so the batch is measured by `total_changes()` instead.
    fn exec(&self, sql: &str) -> Result<usize, BackendError> {
        let guard = self.lock();
        let before = guard.total_changes();
        guard.execute_batch(sql)?;
        let affected = guard.total_changes().saturating_sub(before);
        usize::try_from(affected).map_err(|e| {
            BackendError::Execution(format!("sqlite affected rows conversion error: {e}"))
        })
    }

    fn last_insert_id(&self) -> Result<String, BackendError> {
        Ok(self.lock().last_insert_rowid().to_string())
    }

    fn quote(&self, text: &str) -> Result<String, BackendError> {
        let guard = self.lock();
        let quoted = guard.query_row("SELECT quote(?1)", [text], |row| row.get::<_, String>(0))?;
        Ok(quoted)
    }

    fn quote_blob(&self, bytes: &[u8]) -> Result<String, BackendError> {
        let guard = self.lock();
        let quoted = guard.query_row("SELECT quote(?1)", [bytes], |row| row.get::<_, String>(0))?;
        Ok(quoted)
    }
}
