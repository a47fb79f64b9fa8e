use std::sync::{Arc, Mutex, MutexGuard};

use super::cell::{LiveParam, ValueCell};
use crate::coercion::{Coerced, coerce};
use crate::error::ValidationError;
use crate::types::{BindMode, SemanticType, SqlValue};

/// Where an entry's value lives.
#[derive(Debug, Clone)]
pub enum Source {
    /// A copy owned by the bag.
    Owned(SqlValue),
    /// An alias to caller-owned storage.
    Live(ValueCell),
}

impl Source {
    #[must_use]
    pub fn snapshot(&self) -> SqlValue {
        match self {
            Source::Owned(value) => value.clone(),
            Source::Live(cell) => cell.get(),
        }
    }
}

/// What an entry is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Input to the statement itself.
    In(BindMode),
    /// Backend variable set before a routine call and read back after it.
    InOut { mode: BindMode, var: String },
    /// Backend variable only read back after a routine call.
    Out {
        var: String,
        declared: Option<SemanticType>,
    },
}

impl Role {
    #[must_use]
    pub fn is_routine_param(&self) -> bool {
        matches!(self, Role::InOut { .. } | Role::Out { .. })
    }

    #[must_use]
    pub fn var(&self) -> Option<&str> {
        match self {
            Role::In(_) => None,
            Role::InOut { var, .. } | Role::Out { var, .. } => Some(var),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BindingEntry {
    pub tag: String,
    pub source: Source,
    pub ty: SemanticType,
    pub nullable: bool,
    pub role: Role,
    // rendered once, on first substitution
    pub(crate) literal: Option<String>,
}

impl BindingEntry {
    pub(crate) fn new(
        tag: String,
        source: Source,
        ty: SemanticType,
        nullable: bool,
        role: Role,
    ) -> Self {
        Self {
            tag,
            source,
            ty,
            nullable,
            role,
            literal: None,
        }
    }

    /// Coerce the entry's current value.
    ///
    /// # Errors
    /// Returns `ValidationError` if the value is null without the nullable flag or
    /// cannot be cast to the entry's type.
    pub fn coerce(&self) -> Result<Coerced, ValidationError> {
        coerce(&self.source.snapshot(), self.ty, self.nullable)
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.source, Source::Live(_))
    }

    #[must_use]
    pub fn live_param(&self) -> Option<LiveParam> {
        match &self.source {
            Source::Live(cell) => Some(LiveParam::new(cell.clone(), self.ty, self.nullable)),
            Source::Owned(_) => None,
        }
    }

    /// Inline IN entries are substituted into the SQL text.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.role == Role::In(BindMode::Inline)
    }

    /// IN entries bound through a prepared handle.
    #[must_use]
    pub fn is_bound_input(&self) -> bool {
        matches!(
            self.role,
            Role::In(BindMode::ByValue | BindMode::ByReference)
        )
    }
}

/// Tag → entry store for one statement context, in registration order.
#[derive(Debug, Default)]
pub struct BindingBag {
    entries: Vec<BindingEntry>,
}

pub(crate) type SharedBag = Arc<Mutex<BindingBag>>;

pub(crate) fn lock_bag(bag: &SharedBag) -> MutexGuard<'_, BindingBag> {
    match bag.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl BindingBag {
    pub(crate) fn push(&mut self, entry: BindingEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&BindingEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BindingEntry> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut BindingEntry> {
        self.entries.iter_mut()
    }

    /// Whether any entry aliases caller storage.
    #[must_use]
    pub fn has_live(&self) -> bool {
        self.entries.iter().any(BindingEntry::is_live)
    }

    /// INOUT and OUT entries, in registration order.
    pub fn routine_params(&self) -> impl Iterator<Item = &BindingEntry> {
        self.entries.iter().filter(|e| e.role.is_routine_param())
    }

    /// Drop INOUT and OUT entries once a call has consumed them.
    pub(crate) fn clear_routine_params(&mut self) {
        self.entries.retain(|e| !e.role.is_routine_param());
    }
}
