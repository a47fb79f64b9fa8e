//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::backend::{Connection, Handle};
pub use crate::binding::{
    BindOpts, InInjector, InOutInjector, Inject, OutInjector, Param, ValueCell,
};
pub use crate::config::{ConnectionConfig, EngineConfig};
pub use crate::error::{BackendError, BinderyError, ValidationError};
pub use crate::registry::Registry;
pub use crate::results::{CallOutcome, ResultSet, Row};
pub use crate::session::{BackendFailure, ErrorMode, Session, Verb};
pub use crate::tags::TagAllocator;
pub use crate::types::{BindMode, ParamKind, SemanticType, SqlValue};

#[cfg(feature = "sqlite")]
pub use crate::exports::SqliteConnection;
#[cfg(feature = "sqlite")]
pub use crate::exports::SqliteOptions;
#[cfg(feature = "sqlite")]
pub use crate::exports::SqliteOptionsBuilder;
