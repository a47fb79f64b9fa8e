use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;

use crate::types::SemanticType;

/// Errors raised while a caller builds a statement.
///
/// These always reach the caller, whatever the error mode, because they point at a
/// mistake in template construction rather than at the backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("the value is not nullable")]
    NotNullable,

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("cannot redefine the type of an injector locked to {locked:?} (requested {requested:?})")]
    Redefinition {
        locked: SemanticType,
        requested: SemanticType,
    },
}

/// Failures surfaced by a backend connection or prepared handle.
#[derive(Debug, Error)]
pub enum BackendError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("SQL execution error: {0}")]
    Execution(String),
}

#[derive(Debug, Error)]
pub enum BinderyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BinderyError {
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }

    /// Borrow the validation error, if this is one.
    #[must_use]
    pub fn as_validation(&self) -> Option<&ValidationError> {
        if let Self::Validation(err) = self {
            Some(err)
        } else {
            None
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for BinderyError {
    fn from(err: rusqlite::Error) -> Self {
        BinderyError::Backend(BackendError::Sqlite(err))
    }
}
