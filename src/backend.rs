//! Seams to the relational backend.
//!
//! A [`Connection`] executes text and hands out prepared [`Handle`]s; the session never
//! talks to a driver directly.

use crate::binding::LiveParam;
use crate::error::BackendError;
use crate::results::ResultSet;
use crate::types::{ParamKind, SqlValue, hex};

pub trait Connection: Send + Sync {
    /// Prepare `sql`, whose named parameters are the tags still present in the text.
    ///
    /// # Errors
    /// Returns `BackendError` if the backend rejects the statement.
    fn prepare(&self, sql: &str) -> Result<Box<dyn Handle>, BackendError>;

    /// Run `sql` and collect every row.
    ///
    /// # Errors
    /// Returns `BackendError` on execution failure.
    fn query(&self, sql: &str) -> Result<ResultSet, BackendError>;

    /// Run `sql` and return the affected row count.
    ///
    /// # Errors
    /// Returns `BackendError` on execution failure.
    fn exec(&self, sql: &str) -> Result<usize, BackendError>;

    /// Identifier generated by the most recent insert, as text.
    ///
    /// # Errors
    /// Returns `BackendError` if the backend cannot report it.
    fn last_insert_id(&self) -> Result<String, BackendError>;

    /// Quote `text` as a string literal, surrounding quotes included.
    ///
    /// # Errors
    /// Returns `BackendError` if the backend quoting call fails.
    fn quote(&self, text: &str) -> Result<String, BackendError>;

    /// Render bytes as a literal. Defaults to a `0x` hex literal, `''` when empty.
    ///
    /// # Errors
    /// Returns `BackendError` if a backend-specific rendering fails.
    fn quote_blob(&self, bytes: &[u8]) -> Result<String, BackendError> {
        if bytes.is_empty() {
            Ok("''".to_string())
        } else {
            Ok(format!("0x{}", hex(bytes)))
        }
    }

    /// # Errors
    /// Returns `BackendError` on failure.
    fn begin(&self) -> Result<(), BackendError> {
        self.exec("BEGIN").map(|_| ())
    }

    /// # Errors
    /// Returns `BackendError` on failure.
    fn commit(&self) -> Result<(), BackendError> {
        self.exec("COMMIT").map(|_| ())
    }

    /// # Errors
    /// Returns `BackendError` on failure.
    fn rollback(&self) -> Result<(), BackendError> {
        self.exec("ROLLBACK").map(|_| ())
    }

    /// # Errors
    /// Returns `BackendError` on failure.
    fn savepoint(&self, name: &str) -> Result<(), BackendError> {
        self.exec(&format!("SAVEPOINT {name}")).map(|_| ())
    }

    /// # Errors
    /// Returns `BackendError` on failure.
    fn rollback_to_savepoint(&self, name: &str) -> Result<(), BackendError> {
        self.exec(&format!("ROLLBACK TO SAVEPOINT {name}")).map(|_| ())
    }

    /// # Errors
    /// Returns `BackendError` on failure.
    fn release_savepoint(&self, name: &str) -> Result<(), BackendError> {
        self.exec(&format!("RELEASE SAVEPOINT {name}")).map(|_| ())
    }
}

/// A prepared statement.
///
/// Values bound with [`Handle::bind_value`] are fixed at bind time; parameters bound with
/// [`Handle::bind_param`] are re-read from their cell at every [`Handle::execute`].
pub trait Handle: Send {
    /// # Errors
    /// Returns `BackendError` if `tag` is not a parameter of the statement.
    fn bind_value(&mut self, tag: &str, value: SqlValue, kind: ParamKind) -> Result<(), BackendError>;

    /// # Errors
    /// Returns `BackendError` if `tag` is not a parameter of the statement.
    fn bind_param(&mut self, tag: &str, param: LiveParam, kind: ParamKind) -> Result<(), BackendError>;

    /// # Errors
    /// Returns `BackendError` on execution failure, including a live value that no longer
    /// coerces to its type.
    fn execute(&mut self) -> Result<(), BackendError>;

    /// Rows of the current result set.
    ///
    /// # Errors
    /// Returns `BackendError` if rows cannot be read.
    fn fetch_all(&mut self) -> Result<ResultSet, BackendError>;

    /// Rows affected by the last execution.
    fn row_count(&self) -> usize;

    /// Advance to the next result set; `false` when none remain.
    ///
    /// # Errors
    /// Returns `BackendError` if advancing fails.
    fn next_result_set(&mut self) -> Result<bool, BackendError>;
}
