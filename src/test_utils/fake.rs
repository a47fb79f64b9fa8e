use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{Connection, Handle};
use crate::binding::LiveParam;
use crate::error::BackendError;
use crate::results::ResultSet;
use crate::types::{ParamKind, SqlValue};

/// One call observed by a [`FakeConnection`] or one of its handles.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Prepare(String),
    Query(String),
    Exec(String),
    Quote(String),
    BindValue { tag: String, kind: ParamKind },
    BindParam { tag: String, kind: ParamKind },
    /// An execution, with the values every parameter held at that moment.
    Execute {
        sql: String,
        values: Vec<(String, SqlValue)>,
    },
}

#[derive(Default)]
struct FakeState {
    events: Vec<Event>,
    query_results: VecDeque<ResultSet>,
    rowsets: VecDeque<Vec<ResultSet>>,
    fail_on: Vec<String>,
    last_insert_id: u64,
    affected: usize,
}

/// In-process backend that records every call and replays scripted results.
///
/// Clones share state, so a test can keep one clone for inspection while the registry
/// owns another.
#[derive(Clone, Default)]
pub struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnection {
    #[must_use]
    pub fn new() -> Self {
        let fake = Self::default();
        fake.lock().affected = 1;
        fake
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue the rows returned by the next `query` or row-producing execution.
    pub fn push_query_result(&self, rows: ResultSet) {
        self.lock().query_results.push_back(rows);
    }

    /// Queue the result sets produced by the next handle execution.
    pub fn push_rowsets(&self, rowsets: Vec<ResultSet>) {
        self.lock().rowsets.push_back(rowsets);
    }

    /// Fail every statement whose SQL contains `needle`.
    pub fn fail_on(&self, needle: &str) {
        self.lock().fail_on.push(needle.to_string());
    }

    /// Affected-row count reported by `exec` and `row_count`.
    pub fn set_affected(&self, affected: usize) {
        self.lock().affected = affected;
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    #[must_use]
    pub fn quote_count(&self) -> usize {
        self.count(|e| matches!(e, Event::Quote(_)))
    }

    #[must_use]
    pub fn prepare_count(&self) -> usize {
        self.count(|e| matches!(e, Event::Prepare(_)))
    }

    /// Number of `bind_param` calls made for `tag`.
    #[must_use]
    pub fn bind_param_count(&self, tag: &str) -> usize {
        self.count(|e| matches!(e, Event::BindParam { tag: t, .. } if t == tag))
    }

    /// Number of `bind_value` calls made for `tag`.
    #[must_use]
    pub fn bind_value_count(&self, tag: &str) -> usize {
        self.count(|e| matches!(e, Event::BindValue { tag: t, .. } if t == tag))
    }

    /// SQL text of every statement that reached the backend, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Query(sql) | Event::Exec(sql) | Event::Execute { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.lock().events.iter().filter(|e| pred(e)).count()
    }

    fn check(state: &FakeState, sql: &str) -> Result<(), BackendError> {
        match state.fail_on.iter().find(|needle| sql.contains(needle.as_str())) {
            Some(needle) => Err(BackendError::Execution(format!(
                "scripted failure on {needle:?}"
            ))),
            None => Ok(()),
        }
    }

    fn record(state: &mut FakeState, event: Event) {
        state.events.push(event);
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start().to_ascii_uppercase().starts_with("INSERT")
}

fn is_select(sql: &str) -> bool {
    sql.trim_start().to_ascii_uppercase().starts_with("SELECT")
}

impl Connection for FakeConnection {
    fn prepare(&self, sql: &str) -> Result<Box<dyn Handle>, BackendError> {
        let mut state = self.lock();
        Self::record(&mut state, Event::Prepare(sql.to_string()));
        Ok(Box::new(FakeHandle {
            owner: self.clone(),
            sql: sql.to_string(),
            bound: Vec::new(),
            rowsets: Vec::new(),
            cursor: 0,
        }))
    }

    fn query(&self, sql: &str) -> Result<ResultSet, BackendError> {
        let mut state = self.lock();
        Self::check(&state, sql)?;
        Self::record(&mut state, Event::Query(sql.to_string()));
        Ok(state.query_results.pop_front().unwrap_or_default())
    }

    fn exec(&self, sql: &str) -> Result<usize, BackendError> {
        let mut state = self.lock();
        Self::check(&state, sql)?;
        Self::record(&mut state, Event::Exec(sql.to_string()));
        if is_insert(sql) {
            state.last_insert_id += 1;
        }
        Ok(state.affected)
    }

    fn last_insert_id(&self) -> Result<String, BackendError> {
        Ok(self.lock().last_insert_id.to_string())
    }

    fn quote(&self, text: &str) -> Result<String, BackendError> {
        let mut state = self.lock();
        Self::record(&mut state, Event::Quote(text.to_string()));
        Ok(format!("'{}'", text.replace('\'', "''")))
    }
}

enum FakeBound {
    Value(SqlValue),
    Live(LiveParam),
}

/// Handle produced by [`FakeConnection::prepare`].
pub struct FakeHandle {
    owner: FakeConnection,
    sql: String,
    bound: Vec<(String, FakeBound)>,
    rowsets: Vec<ResultSet>,
    cursor: usize,
}

impl FakeHandle {
    fn put(&mut self, tag: &str, bound: FakeBound) {
        match self.bound.iter_mut().find(|(t, _)| t == tag) {
            Some(slot) => slot.1 = bound,
            None => self.bound.push((tag.to_string(), bound)),
        }
    }
}

impl Handle for FakeHandle {
    fn bind_value(&mut self, tag: &str, value: SqlValue, kind: ParamKind) -> Result<(), BackendError> {
        FakeConnection::record(
            &mut self.owner.lock(),
            Event::BindValue {
                tag: tag.to_string(),
                kind,
            },
        );
        self.put(tag, FakeBound::Value(value));
        Ok(())
    }

    fn bind_param(&mut self, tag: &str, param: LiveParam, kind: ParamKind) -> Result<(), BackendError> {
        FakeConnection::record(
            &mut self.owner.lock(),
            Event::BindParam {
                tag: tag.to_string(),
                kind,
            },
        );
        self.put(tag, FakeBound::Live(param));
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        let values = self
            .bound
            .iter()
            .map(|(tag, bound)| {
                let value = match bound {
                    FakeBound::Value(value) => value.clone(),
                    FakeBound::Live(param) => param
                        .current()
                        .map_err(|e| BackendError::Execution(e.to_string()))?
                        .value,
                };
                Ok((tag.clone(), value))
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        let mut state = self.owner.lock();
        FakeConnection::check(&state, &self.sql)?;
        FakeConnection::record(
            &mut state,
            Event::Execute {
                sql: self.sql.clone(),
                values,
            },
        );
        if is_insert(&self.sql) {
            state.last_insert_id += 1;
        }
        self.rowsets = match state.rowsets.pop_front() {
            Some(rowsets) => rowsets,
            None if is_select(&self.sql) => state.query_results.pop_front().into_iter().collect(),
            None => Vec::new(),
        };
        self.cursor = 0;
        Ok(())
    }

    fn fetch_all(&mut self) -> Result<ResultSet, BackendError> {
        Ok(self
            .rowsets
            .get_mut(self.cursor)
            .map(std::mem::take)
            .unwrap_or_default())
    }

    fn row_count(&self) -> usize {
        self.owner.lock().affected
    }

    fn next_result_set(&mut self) -> Result<bool, BackendError> {
        self.cursor += 1;
        Ok(self.cursor < self.rowsets.len())
    }
}
