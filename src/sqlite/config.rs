use std::time::Duration;

use crate::error::BackendError;

use super::connection::SqliteConnection;

/// Options for opening a `SQLite` connection.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    pub wal: bool,
    pub busy_timeout: Option<Duration>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            wal: true,
            busy_timeout: None,
        }
    }

    /// Options for a private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(":memory:".to_string())
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open a connection with these options.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the database cannot be opened or the initial pragmas fail.
    pub fn open(self) -> Result<SqliteConnection, BackendError> {
        SqliteConnection::open(&self.finish())
    }
}

impl SqliteConnection {
    #[must_use]
    pub fn builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }
}
