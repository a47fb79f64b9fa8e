use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::types::Value;

use crate::backend::Handle;
use crate::binding::LiveParam;
use crate::error::BackendError;
use crate::results::ResultSet;
use crate::types::{ParamKind, SqlValue};

use super::params::to_sqlite_value;
use super::query::{collect_rows, column_names};

enum Bound {
    // converted once, at bind time
    Value(Value),
    Live(LiveParam),
}

/// Prepared `SQLite` statement.
///
/// The statement itself lives in `rusqlite`'s per-connection cache and borrows the
/// connection guard, so the handle cannot hold it between executions. The cache clears
/// a statement's bindings when it is returned, which means every parameter is handed to
/// `SQLite` again at each execution. By-value parameters are converted once when bound
/// and only copied on execute; live parameters are read from their cell at that moment.
pub struct SqliteHandle {
    conn: Arc<Mutex<rusqlite::Connection>>,
    sql: String,
    params: Vec<Option<String>>,
    bound: HashMap<String, Bound>,
    rows: Option<ResultSet>,
    changes: usize,
}

impl SqliteHandle {
    pub(crate) fn new(
        conn: Arc<Mutex<rusqlite::Connection>>,
        sql: String,
        params: Vec<Option<String>>,
    ) -> Self {
        Self {
            conn,
            sql,
            params,
            bound: HashMap::new(),
            rows: None,
            changes: 0,
        }
    }

    fn check_param(&self, tag: &str) -> Result<(), BackendError> {
        if self.params.iter().flatten().any(|name| name == tag) {
            Ok(())
        } else {
            Err(BackendError::Execution(format!(
                "{tag} is not a parameter of the prepared statement"
            )))
        }
    }

    fn resolve(&self, name: Option<&str>) -> Result<Value, BackendError> {
        let Some(name) = name else {
            return Err(BackendError::Execution(
                "positional parameters are not supported".into(),
            ));
        };
        match self.bound.get(name) {
            Some(Bound::Value(value)) => Ok(value.clone()),
            Some(Bound::Live(param)) => {
                let coerced = param
                    .current()
                    .map_err(|e| BackendError::Execution(format!("parameter {name}: {e}")))?;
                Ok(to_sqlite_value(&coerced.value, coerced.kind))
            }
            None => Err(BackendError::Execution(format!("parameter {name} is not bound"))),
        }
    }
}

impl Handle for SqliteHandle {
    fn bind_value(&mut self, tag: &str, value: SqlValue, kind: ParamKind) -> Result<(), BackendError> {
        self.check_param(tag)?;
        self.bound
            .insert(tag.to_string(), Bound::Value(to_sqlite_value(&value, kind)));
        Ok(())
    }

    fn bind_param(&mut self, tag: &str, param: LiveParam, _kind: ParamKind) -> Result<(), BackendError> {
        self.check_param(tag)?;
        self.bound.insert(tag.to_string(), Bound::Live(param));
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        let values = self
            .params
            .iter()
            .map(|name| self.resolve(name.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;

        let conn = Arc::clone(&self.conn);
        let guard = match conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut stmt = guard.prepare_cached(&self.sql)?;
        for (idx, value) in values.into_iter().enumerate() {
            stmt.raw_bind_parameter(idx + 1, value)?;
        }

        if stmt.column_count() > 0 {
            let columns = column_names(&stmt);
            let rows = collect_rows(stmt.raw_query(), columns)?;
            self.changes = rows.len();
            self.rows = Some(rows);
        } else {
            self.changes = stmt.raw_execute()?;
            self.rows = None;
        }
        Ok(())
    }

    fn fetch_all(&mut self) -> Result<ResultSet, BackendError> {
        Ok(self.rows.take().unwrap_or_default())
    }

    fn row_count(&self) -> usize {
        self.changes
    }

    fn next_result_set(&mut self) -> Result<bool, BackendError> {
        // one statement, one result set
        self.rows = None;
        Ok(false)
    }
}
