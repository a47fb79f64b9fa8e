//! Helper utilities for testing and development.

use std::sync::Arc;

use crate::results::{ResultSet, Row};
use crate::types::SqlValue;

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<SqlValue>) -> Row {
    Row::new(Arc::new(column_names), values)
}

/// Create a result set from column names and row values.
#[must_use]
pub fn result_set(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> ResultSet {
    let mut set = ResultSet::with_columns(columns.iter().map(|c| (*c).to_string()).collect());
    for row in rows {
        set.add_row_values(row);
    }
    set
}
