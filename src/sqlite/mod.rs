// SQLite backend
//
// - config: connection options and the fluent builder
// - connection: the `Connection` implementation
// - prepared: the `Handle` implementation
// - params: value conversion into rusqlite types
// - query: result extraction

pub mod config;
pub mod connection;
pub mod params;
pub mod prepared;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use prepared::SqliteHandle;
pub use query::build_result_set;
