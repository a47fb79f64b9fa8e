use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::BackendError;
use crate::results::ResultSet;
use crate::types::SqlValue;

/// Extract a `SqlValue` from a `SQLite` row.
///
/// # Errors
///
/// Returns `BackendError` if the value cannot be read.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<SqlValue, BackendError> {
    let value: Value = row.get(idx)?;
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Integer(i) => Ok(SqlValue::Int(i)),
        Value::Real(f) => Ok(SqlValue::Float(f)),
        Value::Text(s) => Ok(SqlValue::Text(s)),
        Value::Blob(b) => Ok(SqlValue::Blob(b)),
    }
}

pub(crate) fn column_names(stmt: &Statement) -> Arc<Vec<String>> {
    Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    )
}

/// Drain `rows` into a result set with the given columns.
///
/// # Errors
/// Returns `BackendError` if stepping or value extraction fails.
pub(crate) fn collect_rows(
    mut rows: rusqlite::Rows<'_>,
    columns: Arc<Vec<String>>,
) -> Result<ResultSet, BackendError> {
    let col_count = columns.len();
    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(columns);

    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value_sync(row, i)?);
        }
        result_set.add_row_values(row_values);
    }
    Ok(result_set)
}

/// Build a result set from a parameterless `SQLite` query.
///
/// # Errors
/// Returns `BackendError` if query execution or result processing fails.
pub fn build_result_set(stmt: &mut Statement) -> Result<ResultSet, BackendError> {
    let columns = column_names(stmt);
    let rows = stmt.query([])?;
    collect_rows(rows, columns)
}
