use std::sync::{Arc, Mutex, MutexGuard};

use crate::coercion::{Coerced, coerce};
use crate::error::ValidationError;
use crate::types::{SemanticType, SqlValue};

/// Caller-owned storage bound by reference.
///
/// Cloning a cell clones the alias, not the value: the engine keeps a clone and re-reads
/// it whenever it binds or executes, so updates made through the caller's copy between
/// executions are observed.
#[derive(Debug, Clone)]
pub struct ValueCell(Arc<Mutex<SqlValue>>);

impl ValueCell {
    #[must_use]
    pub fn new(value: impl Into<SqlValue>) -> Self {
        Self(Arc::new(Mutex::new(value.into())))
    }

    fn lock(&self) -> MutexGuard<'_, SqlValue> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace the current value.
    pub fn set(&self, value: impl Into<SqlValue>) {
        *self.lock() = value.into();
    }

    /// Snapshot of the current value.
    #[must_use]
    pub fn get(&self) -> SqlValue {
        self.lock().clone()
    }
}

impl Default for ValueCell {
    fn default() -> Self {
        Self::new(SqlValue::Null)
    }
}

/// A live alias handed to a backend handle, together with the casting rules it is read
/// under.
#[derive(Debug, Clone)]
pub struct LiveParam {
    cell: ValueCell,
    ty: SemanticType,
    nullable: bool,
}

impl LiveParam {
    pub(crate) fn new(cell: ValueCell, ty: SemanticType, nullable: bool) -> Self {
        Self { cell, ty, nullable }
    }

    /// Coerce the value the cell holds right now.
    ///
    /// # Errors
    /// Returns `ValidationError` if the current value cannot be cast to the bound type.
    pub fn current(&self) -> Result<Coerced, ValidationError> {
        coerce(&self.cell.get(), self.ty, self.nullable)
    }
}
