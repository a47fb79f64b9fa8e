use std::collections::HashMap;

use crate::backend::{Connection, Handle};
use crate::binding::{BindingBag, BindingEntry};
use crate::coercion::render_literal;
use crate::error::{BackendError, BinderyError};
use crate::types::ParamKind;

/// Outcome of [`StatementContext::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Built {
    /// Plain SQL with nothing left to bind.
    Literal(String),
    /// The context's handle is prepared and fully bound.
    Prepared,
}

/// Per-session build state: the text the handle was prepared for, the handle, and the
/// kind each parameter was last bound with.
#[derive(Default)]
pub(crate) struct StatementContext {
    built_sql: Option<String>,
    handle: Option<Box<dyn Handle>>,
    last_bound_kind: HashMap<String, ParamKind>,
}

impl StatementContext {
    #[cfg(test)]
    pub(crate) fn built_sql(&self) -> Option<&str> {
        self.built_sql.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn is_prepared(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn handle_mut(&mut self) -> Result<&mut (dyn Handle + 'static), BackendError> {
        match self.handle.as_deref_mut() {
            Some(handle) => Ok(handle),
            None => Err(BackendError::Execution("no prepared statement".into())),
        }
    }

    /// Substitute inline literals, then prepare and bind whatever parameters remain.
    ///
    /// A handle is reused while the substituted text is unchanged; on reuse only
    /// parameters that are new, or live ones whose kind moved, are bound again.
    pub(crate) fn build(
        &mut self,
        template: &str,
        bag: &mut BindingBag,
        conn: &dyn Connection,
    ) -> Result<Built, BinderyError> {
        let sql = substitute_literals(template, bag, conn)?;

        let pending: Vec<&BindingEntry> = bag
            .iter()
            .filter(|e| e.is_bound_input() && sql.contains(e.tag.as_str()))
            .collect();
        if pending.is_empty() {
            return Ok(Built::Literal(sql));
        }

        if self.built_sql.as_deref() != Some(sql.as_str()) || self.handle.is_none() {
            tracing::debug!(sql = %sql, params = pending.len(), "preparing statement");
            self.handle = None;
            self.last_bound_kind.clear();
            self.handle = Some(conn.prepare(&sql)?);
            self.built_sql = Some(sql);
        }

        let Self {
            handle,
            last_bound_kind,
            ..
        } = self;
        let Some(handle) = handle.as_deref_mut() else {
            return Err(BackendError::Execution("no prepared statement".into()).into());
        };

        for entry in pending {
            let coerced = entry.coerce()?;
            match last_bound_kind.get(&entry.tag) {
                None => {
                    tracing::trace!(tag = %entry.tag, kind = ?coerced.kind, "binding");
                }
                Some(kind) if entry.is_live() && *kind != coerced.kind => {
                    tracing::trace!(tag = %entry.tag, from = ?kind, to = ?coerced.kind, "rebinding");
                }
                Some(_) => continue,
            }
            match entry.live_param() {
                Some(live) => handle.bind_param(&entry.tag, live, coerced.kind)?,
                None => handle.bind_value(&entry.tag, coerced.value, coerced.kind)?,
            }
            last_bound_kind.insert(entry.tag.clone(), coerced.kind);
        }
        Ok(Built::Prepared)
    }
}

/// Replace every inline IN tag present in `template` with its literal. Each entry is
/// rendered once; later builds reuse the cached text.
fn substitute_literals(
    template: &str,
    bag: &mut BindingBag,
    conn: &dyn Connection,
) -> Result<String, BinderyError> {
    let mut sql = template.to_string();
    for entry in bag.iter_mut().filter(|e| e.is_inline()) {
        if !sql.contains(entry.tag.as_str()) {
            continue;
        }
        let literal = match &entry.literal {
            Some(literal) => literal.clone(),
            None => {
                let rendered = render_literal(&entry.coerce()?, conn)?;
                entry.literal = Some(rendered.clone());
                rendered
            }
        };
        sql = sql.replace(entry.tag.as_str(), &literal);
    }
    Ok(sql)
}
