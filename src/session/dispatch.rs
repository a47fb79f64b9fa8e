use std::collections::BTreeMap;

use super::Session;
use super::builder::{Built, StatementContext};
use super::interceptor::Verb;
use crate::backend::{Connection, Handle};
use crate::binding::{BindingEntry, Role, lock_bag};
use crate::coercion::{coerce, render_literal};
use crate::error::{BackendError, BinderyError};
use crate::results::{CallOutcome, ResultSet};
use crate::types::{BindMode, SqlValue};

/// Collect the current result set and every one after it.
fn drain(handle: &mut dyn Handle, keep: bool) -> Result<Vec<ResultSet>, BackendError> {
    let mut rowsets = Vec::new();
    loop {
        if keep {
            rowsets.push(handle.fetch_all()?);
        }
        if !handle.next_result_set()? {
            return Ok(rowsets);
        }
    }
}

/// Snapshot of one INOUT/OUT entry, detached from the bag lock.
struct RoutineParam {
    entry: BindingEntry,
    var: String,
}

impl Session {
    /// Build `sql` against the current connection and hand the result to `run`.
    fn dispatch<T>(
        &mut self,
        verb: Verb,
        sql: &str,
        run: impl FnOnce(&dyn Connection, Built, &mut StatementContext) -> Result<T, BackendError>,
    ) -> Result<Option<T>, BinderyError> {
        tracing::debug!(verb = %verb, sql = %sql, "dispatch");
        let outcome = self.current_connection().and_then(|conn| {
            let built = {
                let mut bag = lock_bag(&self.bag);
                self.context.build(sql, &mut bag, conn.as_ref())?
            };
            Ok(run(conn.as_ref(), built, &mut self.context)?)
        });
        let result = self.guard(verb, sql, outcome)?;
        if result.is_some() {
            self.after_success();
        }
        Ok(result)
    }

    /// Run a query and return every row.
    ///
    /// `Ok(None)` means a backend failure was intercepted in wrap mode.
    ///
    /// # Errors
    /// Validation errors and unknown connections always; backend errors in throw mode.
    pub fn select(&mut self, sql: &str) -> Result<Option<ResultSet>, BinderyError> {
        self.dispatch(Verb::Select, sql, |conn, built, ctx| match built {
            Built::Literal(text) => conn.query(&text),
            Built::Prepared => {
                let handle = ctx.handle_mut()?;
                handle.execute()?;
                handle.fetch_all()
            }
        })
    }

    /// Run an insert and return the generated identifier as text.
    ///
    /// # Errors
    /// See [`Session::select`].
    pub fn insert(&mut self, sql: &str) -> Result<Option<String>, BinderyError> {
        self.dispatch(Verb::Insert, sql, |conn, built, ctx| {
            match built {
                Built::Literal(text) => {
                    conn.exec(&text)?;
                }
                Built::Prepared => ctx.handle_mut()?.execute()?,
            }
            conn.last_insert_id()
        })
    }

    fn affecting(&mut self, verb: Verb, sql: &str) -> Result<Option<usize>, BinderyError> {
        self.dispatch(verb, sql, |conn, built, ctx| match built {
            Built::Literal(text) => conn.exec(&text),
            Built::Prepared => {
                let handle = ctx.handle_mut()?;
                handle.execute()?;
                Ok(handle.row_count())
            }
        })
    }

    /// Run an update and return the affected row count.
    ///
    /// # Errors
    /// See [`Session::select`].
    pub fn update(&mut self, sql: &str) -> Result<Option<usize>, BinderyError> {
        self.affecting(Verb::Update, sql)
    }

    /// Run a delete and return the affected row count.
    ///
    /// # Errors
    /// See [`Session::select`].
    pub fn delete(&mut self, sql: &str) -> Result<Option<usize>, BinderyError> {
        self.affecting(Verb::Delete, sql)
    }

    /// Run any other statement, DDL included, and return the affected row count.
    ///
    /// # Errors
    /// See [`Session::select`].
    pub fn execute(&mut self, sql: &str) -> Result<Option<usize>, BinderyError> {
        self.affecting(Verb::Execute, sql)
    }

    /// Call a stored routine.
    ///
    /// INOUT variables are assigned by one `SET` statement first. When `is_query` is set,
    /// every result set the routine yields is collected. OUT and INOUT variables are then
    /// read back with one `SELECT` and cast to their declared types. The routine
    /// parameters are dropped from the bag once the call succeeds.
    ///
    /// # Errors
    /// See [`Session::select`].
    pub fn call(&mut self, sql: &str, is_query: bool) -> Result<Option<CallOutcome>, BinderyError> {
        let routine: Vec<RoutineParam> = lock_bag(&self.bag)
            .routine_params()
            .filter_map(|entry| {
                entry.role.var().map(|var| RoutineParam {
                    var: var.to_string(),
                    entry: entry.clone(),
                })
            })
            .collect();

        tracing::debug!(sql = %sql, routine_params = routine.len(), "dispatch call");
        let outcome = self.current_connection().and_then(|conn| {
            let conn = conn.as_ref();
            assign_inout(conn, &routine)?;

            let built = {
                let mut bag = lock_bag(&self.bag);
                self.context.build(sql, &mut bag, conn)?
            };
            let rowsets = match built {
                Built::Literal(text) => {
                    let mut handle = conn.prepare(&text)?;
                    handle.execute()?;
                    drain(handle.as_mut(), is_query)?
                }
                Built::Prepared => {
                    let handle = self.context.handle_mut()?;
                    handle.execute()?;
                    drain(handle, is_query)?
                }
            };

            let out = fetch_out(conn, &routine)?;
            Ok(CallOutcome { rowsets, out })
        });

        let result = self.guard(Verb::Call, sql, outcome)?;
        if result.is_some() {
            lock_bag(&self.bag).clear_routine_params();
            self.after_success();
        }
        Ok(result)
    }
}

/// Issue `SET v1 = …, v2 = …` for the INOUT entries, prepared when any of them is bound.
fn assign_inout(conn: &dyn Connection, routine: &[RoutineParam]) -> Result<(), BinderyError> {
    let inout: Vec<(&RoutineParam, BindMode)> = routine
        .iter()
        .filter_map(|p| match p.entry.role {
            Role::InOut { mode, .. } => Some((p, mode)),
            _ => None,
        })
        .collect();
    if inout.is_empty() {
        return Ok(());
    }

    let mut assignments = Vec::with_capacity(inout.len());
    let mut bound = Vec::new();
    for (param, mode) in &inout {
        let rhs = if *mode == BindMode::Inline {
            render_literal(&param.entry.coerce()?, conn)?
        } else {
            bound.push(*param);
            param.entry.tag.clone()
        };
        assignments.push(format!("{} = {rhs}", param.var));
    }
    let set_sql = format!("SET {}", assignments.join(", "));
    tracing::debug!(sql = %set_sql, "assigning inout variables");

    if bound.is_empty() {
        conn.exec(&set_sql)?;
        return Ok(());
    }
    let mut handle = conn.prepare(&set_sql)?;
    for param in bound {
        let coerced = param.entry.coerce()?;
        match param.entry.live_param() {
            Some(live) => handle.bind_param(&param.entry.tag, live, coerced.kind)?,
            None => handle.bind_value(&param.entry.tag, coerced.value, coerced.kind)?,
        }
    }
    handle.execute()?;
    Ok(())
}

/// Read every OUT/INOUT variable back with one `SELECT`, keyed by variable name.
fn fetch_out(
    conn: &dyn Connection,
    routine: &[RoutineParam],
) -> Result<Option<BTreeMap<String, SqlValue>>, BinderyError> {
    if routine.is_empty() {
        return Ok(None);
    }
    let vars: Vec<&str> = routine.iter().map(|p| p.var.as_str()).collect();
    let rows = conn.query(&format!("SELECT {}", vars.join(", ")))?;
    let row = rows.first();

    let mut out = BTreeMap::new();
    for (idx, param) in routine.iter().enumerate() {
        let raw = row
            .and_then(|r| r.get_by_index(idx))
            .cloned()
            .unwrap_or(SqlValue::Null);
        let declared = match &param.entry.role {
            Role::Out { declared, .. } => *declared,
            _ => Some(param.entry.ty),
        };
        let value = match declared {
            Some(ty) => coerce(&raw, ty, true)?.value,
            None => raw,
        };
        out.insert(param.var.clone(), value);
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::binding::{BindOpts, Inject, Param, ValueCell};
    use crate::registry::Registry;
    use crate::session::ErrorMode;
    use crate::test_utils::{Event, FakeConnection, result_set};
    use crate::types::SemanticType;

    fn session() -> (Session, FakeConnection) {
        let registry = Registry::new();
        let fake = FakeConnection::new();
        registry.add_connection_instance("main", Arc::new(fake.clone()), true);
        (Session::new(&registry), fake)
    }

    #[test]
    fn by_value_select_prepares_and_resets() -> Result<(), BinderyError> {
        let (mut s, fake) = session();
        fake.push_query_result(result_set(&["n"], vec![vec![SqlValue::Int(3)]]));
        let tag = s.injector_in(BindMode::ByValue).inject_as(10, SemanticType::Int)?;

        let rows = s.select(&format!("SELECT count(*) AS n FROM t WHERE stock = {tag}"))?;
        assert_eq!(rows.map(|r| r.len()), Some(1));
        assert_eq!(fake.bind_value_count(&tag), 1);
        assert_eq!(s.token_count(), 0);
        Ok(())
    }

    #[test]
    fn live_entries_keep_the_context_between_executions() -> Result<(), BinderyError> {
        let (mut s, fake) = session();
        let stock = ValueCell::new(1);
        let tag = s
            .injector_in(BindMode::ByReference)
            .inject(Param::from(&stock), BindOpts::typed(SemanticType::Int))?;
        let sql = format!("UPDATE t SET stock = {tag}");

        for n in 1..=3 {
            stock.set(n);
            assert_eq!(s.update(&sql)?, Some(1));
        }
        assert_eq!(s.token_count(), 1);
        assert_eq!(fake.prepare_count(), 1);
        let executed: Vec<SqlValue> = fake
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute { mut values, .. } => values.pop().map(|(_, v)| v),
                _ => None,
            })
            .collect();
        assert_eq!(executed, [SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]);
        Ok(())
    }

    #[test]
    fn call_sets_inout_and_fetches_out_by_name() -> Result<(), BinderyError> {
        let (mut s, fake) = session();
        fake.push_rowsets(vec![
            result_set(&["a"], vec![vec![SqlValue::Int(1)]]),
            result_set(&["b"], vec![vec![SqlValue::Int(2)]]),
        ]);
        fake.push_query_result(result_set(
            &["@stock", "@nb"],
            vec![vec![SqlValue::Text("30".into()), SqlValue::Int(4)]],
        ));

        let stock = s
            .injector_inout(BindMode::Inline)
            .inject(("@stock".into(), Param::from(25)), BindOpts::typed(SemanticType::Int))?;
        let nb = s
            .injector_out()
            .inject("@nb".into(), BindOpts::typed(SemanticType::Int))?;
        let title = s.lit("Movie", SemanticType::Str)?;

        let outcome = s
            .call(&format!("CALL sp_stock({title}, {stock}, {nb})"), true)?
            .expect("throw mode");
        assert_eq!(outcome.rowsets.len(), 2);
        let out = outcome.out.as_ref().expect("out variables");
        assert_eq!(out.len(), 2);
        assert_eq!(out["@stock"], SqlValue::Int(30));
        assert_eq!(out["@nb"], SqlValue::Int(4));

        assert_eq!(
            fake.statements(),
            [
                "SET @stock = 25",
                "CALL sp_stock('Movie', @stock, @nb)",
                "SELECT @stock, @nb",
            ]
        );
        assert_eq!(s.token_count(), 0);
        Ok(())
    }

    #[test]
    fn bound_inout_assignment_is_prepared() -> Result<(), BinderyError> {
        let (mut s, fake) = session();
        let cell = ValueCell::new("7");
        s.injector_inout(BindMode::ByReference).inject(
            ("@qty".into(), Param::from(&cell)),
            BindOpts::typed(SemanticType::Int),
        )?;
        s.call("CALL bump(@qty)", false)?;

        let events = fake.events();
        let set = events.iter().find_map(|e| match e {
            Event::Execute { sql, values } if sql.starts_with("SET @qty = :") => Some(values.clone()),
            _ => None,
        });
        assert_eq!(set.map(|v| v.len()), Some(1));
        assert_eq!(fake.statements().last().map(String::as_str), Some("SELECT @qty"));
        Ok(())
    }

    #[test]
    fn wrap_mode_intercepts_backend_failures_only() -> Result<(), BinderyError> {
        let (mut s, fake) = session();
        fake.fail_on("TRUNCATE");
        s.registry()
            .set_error_mode(ErrorMode::wrap(|failure| format!("{} :: {}", failure.verb, failure.sql)));

        assert_eq!(s.execute("TRUNCATE TABLE t")?, None);
        assert!(s.has_failed());
        assert_eq!(
            s.registry().take_error_reports(),
            ["execute :: TRUNCATE TABLE t"]
        );

        let err = s.lit(None::<i64>, SemanticType::Int).unwrap_err();
        assert_eq!(err, crate::error::ValidationError::NotNullable);
        Ok(())
    }

    #[test]
    fn failure_suspends_auto_reset_until_reset() -> Result<(), BinderyError> {
        let (mut s, fake) = session();
        fake.fail_on("boom");
        let tag = s.lit(1, SemanticType::Int)?;
        assert!(s.execute(&format!("SELECT boom, {tag}")).is_err());
        assert_eq!(s.token_count(), 1);

        s.execute(&format!("SELECT {tag}"))?;
        assert_eq!(s.token_count(), 1);

        s.reset();
        s.execute("SELECT 1")?;
        let tag = s.lit(2, SemanticType::Int)?;
        s.execute(&format!("SELECT {tag}"))?;
        assert_eq!(s.token_count(), 0);
        Ok(())
    }
}
