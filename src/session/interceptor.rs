use std::fmt;
use std::sync::Arc;

use crate::error::BackendError;

/// The session verb a backend failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Select,
    Insert,
    Update,
    Delete,
    Execute,
    Call,
    StartTransaction,
    Commit,
    Rollback,
    RollbackTo,
    CreateSavepoint,
    Release,
}

impl Verb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Select => "select",
            Verb::Insert => "insert",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::Execute => "execute",
            Verb::Call => "call",
            Verb::StartTransaction => "start_transaction",
            Verb::Commit => "commit",
            Verb::Rollback => "rollback",
            Verb::RollbackTo => "rollback_to",
            Verb::CreateSavepoint => "create_savepoint",
            Verb::Release => "release",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the wrap callback is told about an intercepted failure.
#[derive(Debug)]
pub struct BackendFailure {
    pub verb: Verb,
    pub sql: String,
    pub error: BackendError,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {} [{}]", self.verb, self.error, self.sql)
    }
}

pub type ErrorCallback = Arc<dyn Fn(&BackendFailure) -> String + Send + Sync>;

/// How backend failures reach the caller.
///
/// Validation errors always propagate; only backend failures are subject to the mode.
#[derive(Clone, Default)]
pub enum ErrorMode {
    /// Return the error from the verb.
    #[default]
    Throw,
    /// Hand the failure to the callback, keep its output, and return a neutral result.
    Wrap(ErrorCallback),
}

impl ErrorMode {
    pub fn wrap(callback: impl Fn(&BackendFailure) -> String + Send + Sync + 'static) -> Self {
        ErrorMode::Wrap(Arc::new(callback))
    }

    #[must_use]
    pub fn is_wrap(&self) -> bool {
        matches!(self, ErrorMode::Wrap(_))
    }
}

impl fmt::Debug for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMode::Throw => f.write_str("Throw"),
            ErrorMode::Wrap(_) => f.write_str("Wrap(..)"),
        }
    }
}
