use lazy_static::lazy_static;
use regex::Regex;

use super::Session;
use super::interceptor::Verb;
use crate::backend::Connection;
use crate::error::{BackendError, BinderyError, ValidationError};

lazy_static! {
    static ref SAVEPOINT_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

const AUTO_SAVEPOINT_PREFIX: &str = "sp_";

/// Transaction state of a session: idle, or inside one physical transaction with a
/// stack of savepoints emulating nesting.
///
/// The stack is empty whenever the session is idle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransactionStack {
    active: bool,
    savepoints: Vec<String>,
}

/// What a transaction verb asks the backend to do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TxStep {
    Begin,
    Commit,
    Rollback,
    Savepoint(String),
    RollbackTo(String),
    Release(String),
}

impl TxStep {
    fn sql(&self) -> String {
        match self {
            TxStep::Begin => "BEGIN".into(),
            TxStep::Commit => "COMMIT".into(),
            TxStep::Rollback => "ROLLBACK".into(),
            TxStep::Savepoint(name) => format!("SAVEPOINT {name}"),
            TxStep::RollbackTo(name) => format!("ROLLBACK TO SAVEPOINT {name}"),
            TxStep::Release(name) => format!("RELEASE SAVEPOINT {name}"),
        }
    }

    fn run(&self, conn: &dyn Connection) -> Result<(), BackendError> {
        match self {
            TxStep::Begin => conn.begin(),
            TxStep::Commit => conn.commit(),
            TxStep::Rollback => conn.rollback(),
            TxStep::Savepoint(name) => conn.savepoint(name),
            TxStep::RollbackTo(name) => conn.rollback_to_savepoint(name),
            TxStep::Release(name) => conn.release_savepoint(name),
        }
    }
}

impl TransactionStack {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn savepoints(&self) -> &[String] {
        &self.savepoints
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.savepoints.iter().rposition(|s| s == name)
    }

    fn clear(&mut self) {
        self.active = false;
        self.savepoints.clear();
    }
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    if SAVEPOINT_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue(format!(
            "invalid savepoint name: {name}"
        )))
    }
}

impl Session {
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.is_active()
    }

    /// Savepoints on the stack, oldest first.
    #[must_use]
    pub fn savepoints(&self) -> &[String] {
        self.tx.savepoints()
    }

    /// Run one backend step under the error mode. Callers update the stack after each
    /// step that succeeds, so it always mirrors the backend.
    fn run_tx(&mut self, verb: Verb, step: TxStep) -> Result<bool, BinderyError> {
        let sql = step.sql();
        tracing::debug!(verb = %verb, sql = %sql, "transaction");
        let outcome = self
            .current_connection()
            .and_then(|conn| Ok(step.run(conn.as_ref())?));
        Ok(self.guard(verb, &sql, outcome)?.is_some())
    }

    /// Begin a transaction, or push an auto-named savepoint when one is already open.
    ///
    /// # Errors
    /// Returns `BinderyError` for backend failures in throw mode and for unknown
    /// connections.
    pub fn start_transaction(&mut self) -> Result<bool, BinderyError> {
        if self.tx.active {
            let name = self
                .registry
                .tags()
                .next_tag(Some(AUTO_SAVEPOINT_PREFIX));
            return self.create_savepoint(&name);
        }
        let ok = self.run_tx(Verb::StartTransaction, TxStep::Begin)?;
        if ok {
            self.tx.active = true;
        }
        Ok(ok)
    }

    /// Commit and clear the savepoint stack. A no-op while idle.
    ///
    /// # Errors
    /// See [`Session::start_transaction`].
    pub fn commit(&mut self) -> Result<bool, BinderyError> {
        if !self.tx.active {
            return Ok(false);
        }
        let ok = self.run_tx(Verb::Commit, TxStep::Commit)?;
        if ok {
            self.tx.clear();
        }
        Ok(ok)
    }

    /// Roll back the most recent savepoint, or the whole transaction when at most one
    /// savepoint is open.
    ///
    /// # Errors
    /// See [`Session::start_transaction`].
    pub fn rollback(&mut self) -> Result<bool, BinderyError> {
        if !self.tx.active {
            return Ok(false);
        }
        if self.tx.savepoints.len() <= 1 {
            return self.rollback_all();
        }
        let Some(name) = self.tx.savepoints.last().cloned() else {
            return Ok(false);
        };
        let ok = self.run_tx(Verb::Rollback, TxStep::RollbackTo(name))?;
        if ok {
            self.tx.savepoints.pop();
        }
        Ok(ok)
    }

    /// Roll back the whole transaction regardless of open savepoints.
    ///
    /// # Errors
    /// See [`Session::start_transaction`].
    pub fn rollback_all(&mut self) -> Result<bool, BinderyError> {
        if !self.tx.active {
            return Ok(false);
        }
        let ok = self.run_tx(Verb::Rollback, TxStep::Rollback)?;
        if ok {
            self.tx.clear();
        }
        Ok(ok)
    }

    /// Roll back to `name`, discarding every later savepoint. Unknown names are a no-op.
    ///
    /// # Errors
    /// `InvalidValue` for a malformed name; otherwise see [`Session::start_transaction`].
    pub fn rollback_to(&mut self, name: &str) -> Result<bool, BinderyError> {
        check_name(name)?;
        let Some(pos) = self.tx.position(name) else {
            return Ok(false);
        };
        let ok = self.run_tx(Verb::RollbackTo, TxStep::RollbackTo(name.to_string()))?;
        if ok {
            self.tx.savepoints.truncate(pos + 1);
        }
        Ok(ok)
    }

    /// Push a named savepoint, starting a transaction first when idle.
    ///
    /// # Errors
    /// `InvalidValue` for a malformed name; otherwise see [`Session::start_transaction`].
    pub fn create_savepoint(&mut self, name: &str) -> Result<bool, BinderyError> {
        check_name(name)?;
        if !self.tx.active {
            if !self.run_tx(Verb::CreateSavepoint, TxStep::Begin)? {
                return Ok(false);
            }
            self.tx.active = true;
        }
        let ok = self.run_tx(Verb::CreateSavepoint, TxStep::Savepoint(name.to_string()))?;
        if ok {
            self.tx.savepoints.push(name.to_string());
        }
        Ok(ok)
    }

    /// Release `name` and every savepoint created after it, without rolling back.
    ///
    /// # Errors
    /// `InvalidValue` for a malformed name; otherwise see [`Session::start_transaction`].
    pub fn release(&mut self, name: &str) -> Result<bool, BinderyError> {
        check_name(name)?;
        let Some(pos) = self.tx.position(name) else {
            return Ok(false);
        };
        let ok = self.run_tx(Verb::Release, TxStep::Release(name.to_string()))?;
        if ok {
            self.tx.savepoints.truncate(pos);
        }
        Ok(ok)
    }
}
