//! Statement contexts: the bag of pending bindings, the prepared handle, transaction
//! state, and the verbs that execute built SQL.

mod builder;
mod dispatch;
mod interceptor;
mod transaction;

use std::sync::{Arc, Mutex};

pub use interceptor::{BackendFailure, ErrorCallback, ErrorMode, Verb};
pub use transaction::TransactionStack;

use crate::backend::Connection;
use crate::binding::{
    BindOpts, BindingBag, InInjector, InOutInjector, Inject, InjectorCore, OutInjector, Param,
    SharedBag, lock_bag,
};
use crate::error::{BinderyError, ValidationError};
use crate::registry::Registry;
use crate::types::BindMode;

use builder::StatementContext;

/// One logical caller's view of the engine.
///
/// A session owns a binding bag, the prepared handle built from it, and its transaction
/// stack. Injectors obtained from a session feed its bag; verbs build and run SQL
/// against the session's current connection.
///
/// ```rust
/// use sql_bindery::prelude::*;
/// use sql_bindery::test_utils::FakeConnection;
/// use std::sync::Arc;
///
/// let registry = Registry::new();
/// let backend = FakeConnection::new();
/// registry.add_connection_instance("main", Arc::new(backend.clone()), true);
///
/// let mut session = Session::new(&registry);
/// let title = session.lit("Movie", SemanticType::Str)?;
/// let id = session.insert(&format!("INSERT INTO t_video (title) VALUES ({title})"))?;
/// assert_eq!(id.as_deref(), Some("1"));
/// assert_eq!(backend.statements(), ["INSERT INTO t_video (title) VALUES ('Movie')"]);
/// assert_eq!(session.token_count(), 0);
/// # Ok::<(), sql_bindery::error::BinderyError>(())
/// ```
pub struct Session {
    registry: Arc<Registry>,
    connection_id: Option<String>,
    bag: SharedBag,
    context: StatementContext,
    tx: TransactionStack,
    auto_reset: bool,
    has_failed: bool,
}

impl Session {
    /// A session on the registry's default connection.
    #[must_use]
    pub fn new(registry: &Arc<Registry>) -> Self {
        Self {
            registry: Arc::clone(registry),
            connection_id: None,
            bag: Arc::new(Mutex::new(BindingBag::default())),
            context: StatementContext::default(),
            tx: TransactionStack::default(),
            auto_reset: registry.auto_reset_default(),
            has_failed: false,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Point the session at another registered connection.
    ///
    /// # Errors
    /// Returns `BinderyError::UnknownConnection` if `id` is not registered.
    pub fn use_connection(&mut self, id: &str) -> Result<(), BinderyError> {
        if !self.registry.has_connection(id) {
            return Err(BinderyError::UnknownConnection(id.to_string()));
        }
        self.connection_id = Some(id.to_string());
        Ok(())
    }

    /// The explicitly selected connection, `None` while on the default.
    #[must_use]
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    fn core(&self, mode: BindMode) -> InjectorCore {
        InjectorCore::new(
            mode,
            Arc::clone(&self.bag),
            self.registry.tags().clone(),
            self.registry.tag_prefix(),
        )
    }

    #[must_use]
    pub fn injector_in(&self, mode: BindMode) -> InInjector {
        InInjector::new(self.core(mode))
    }

    #[must_use]
    pub fn injector_inout(&self, mode: BindMode) -> InOutInjector {
        InOutInjector::new(self.core(mode))
    }

    #[must_use]
    pub fn injector_out(&self) -> OutInjector {
        OutInjector::new(self.core(BindMode::Inline))
    }

    /// Inject `value` as an inline literal.
    ///
    /// # Errors
    /// See [`Inject::inject`].
    pub fn lit(&self, value: impl Into<Param>, opts: impl Into<BindOpts>) -> Result<String, ValidationError> {
        self.injector_in(BindMode::Inline).inject(value.into(), opts.into())
    }

    /// Number of entries in the bag.
    #[must_use]
    pub fn token_count(&self) -> usize {
        lock_bag(&self.bag).len()
    }

    /// Clear the bag, the prepared handle and the failed flag.
    ///
    /// Injectors handed out earlier stay attached to this session and feed the fresh
    /// bag.
    pub fn reset(&mut self) {
        lock_bag(&self.bag).clear();
        self.context = StatementContext::default();
        self.has_failed = false;
    }

    pub fn set_auto_reset(&mut self, on: bool) {
        self.auto_reset = on;
    }

    #[must_use]
    pub fn auto_reset(&self) -> bool {
        self.auto_reset
    }

    /// Whether a verb failed since the last [`Session::reset`].
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.has_failed
    }

    pub(crate) fn current_connection(&self) -> Result<Arc<dyn Connection>, BinderyError> {
        self.registry.connection(self.connection_id.as_deref())
    }

    /// Route a failed outcome through the registry's error mode.
    ///
    /// Backend failures become `Ok(None)` in wrap mode; everything else propagates.
    /// Any failure marks the session failed.
    pub(crate) fn guard<T>(
        &mut self,
        verb: Verb,
        sql: &str,
        outcome: Result<T, BinderyError>,
    ) -> Result<Option<T>, BinderyError> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(BinderyError::Backend(error)) => {
                self.has_failed = true;
                tracing::warn!(verb = %verb, sql = %sql, error = %error, "backend failure");
                self.registry.intercept(BackendFailure {
                    verb,
                    sql: sql.to_string(),
                    error,
                })?;
                Ok(None)
            }
            Err(other) => {
                self.has_failed = true;
                Err(other)
            }
        }
    }

    /// Clear the statement state after a success, unless auto-reset is off, an earlier
    /// verb failed, or live cells are still bound.
    pub(crate) fn after_success(&mut self) {
        if !self.auto_reset || self.has_failed {
            return;
        }
        let mut bag = lock_bag(&self.bag);
        if bag.has_live() {
            tracing::trace!(entries = bag.len(), "live bindings present, keeping statement context");
            return;
        }
        bag.clear();
        drop(bag);
        self.context = StatementContext::default();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection_id", &self.connection_id)
            .field("tokens", &self.token_count())
            .field("tx", &self.tx)
            .field("auto_reset", &self.auto_reset)
            .field("has_failed", &self.has_failed)
            .finish_non_exhaustive()
    }
}
