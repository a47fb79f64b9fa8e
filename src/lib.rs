//! Tag-based SQL statement construction and parameter binding.
//!
//! Callers build SQL text incrementally, capturing each value through an injector that
//! returns an opaque tag to splice into the text. A [`Session`] then resolves the tags
//! in one of three ways:
//!
//! - inline: the value is escaped by the backend and substituted into the text;
//! - by value: the value is bound once to a prepared statement;
//! - by reference: a caller-owned [`ValueCell`] is bound and re-read at every execution.
//!
//! ```rust,no_run
//! use sql_bindery::prelude::*;
//!
//! # fn main() -> Result<(), BinderyError> {
//! let registry = Registry::new();
//! registry.add_sqlite("main", SqliteOptions::in_memory(), true);
//! let mut session = registry.session();
//!
//! session.execute("CREATE TABLE t_video (id INTEGER PRIMARY KEY, title TEXT, stock INT)")?;
//!
//! let title = session.lit("Movie", SemanticType::Str)?;
//! let stock = session.injector_in(BindMode::ByValue).inject_as(10, SemanticType::Int)?;
//! let id = session.insert(&format!(
//!     "INSERT INTO t_video (title, stock) VALUES ({title}, {stock})"
//! ))?;
//! assert_eq!(id.as_deref(), Some("1"));
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod binding;
pub mod coercion;
pub mod config;
pub mod error;
pub mod exports;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod session;
pub mod tags;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use backend::{Connection, Handle};
pub use binding::{BindOpts, Inject, Param, ValueCell};
pub use error::{BackendError, BinderyError, ValidationError};
pub use registry::Registry;
pub use results::{CallOutcome, ResultSet, Row};
pub use session::{ErrorMode, Session};
pub use types::{BindMode, ParamKind, SemanticType, SqlValue};
