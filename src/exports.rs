//! Backend-specific type exports.
//!
//! Conditional feature exports for the bundled backends, kept in one place.

// SQLite exports
#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteConnection;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteHandle;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::build_result_set as sqlite_build_result_set;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteOptions, SqliteOptionsBuilder};

// Test backend exports
#[cfg(any(test, feature = "test-utils"))]
pub use crate::test_utils::FakeConnection;
