//! Process-wide service boundary: named connections, the tag allocator, and the error
//! mode shared by every session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use lazy_static::lazy_static;

use crate::backend::Connection;
use crate::config::{ConnectionConfig, EngineConfig};
use crate::error::{BackendError, BinderyError};
use crate::session::{BackendFailure, ErrorMode, Session};
use crate::tags::{DEFAULT_TAG_PREFIX, TagAllocator};

#[cfg(feature = "sqlite")]
use crate::sqlite::{SqliteConnection, SqliteOptions};

lazy_static! {
    static ref GLOBAL: Arc<Registry> = Registry::new();
}

/// Opens a connection the first time its id is used.
pub type ConnectionFactory = Box<dyn Fn() -> Result<Arc<dyn Connection>, BackendError> + Send + Sync>;

enum Slot {
    Pending(ConnectionFactory),
    Open(Arc<dyn Connection>),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct Registry {
    connections: Mutex<HashMap<String, Slot>>,
    default_connection: Mutex<Option<String>>,
    tags: TagAllocator,
    tag_prefix: Arc<str>,
    auto_reset: AtomicBool,
    error_mode: Mutex<ErrorMode>,
    reports: Mutex<Vec<String>>,
}

impl Registry {
    /// An empty registry with its own tag allocator.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_allocator(TagAllocator::new())
    }

    /// An empty registry drawing tags from `tags`.
    #[must_use]
    pub fn with_allocator(tags: TagAllocator) -> Arc<Self> {
        Arc::new(Self::bare(tags))
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Build a registry from a loaded configuration. Connections open lazily.
    ///
    /// # Errors
    /// Returns `BinderyError::Config` if the configuration is inconsistent or names a
    /// backend this build does not include.
    pub fn from_config(config: &EngineConfig) -> Result<Arc<Self>, BinderyError> {
        config.validate()?;
        let registry = Arc::new(Self {
            tag_prefix: Arc::from(config.tag_prefix.as_str()),
            auto_reset: AtomicBool::new(config.auto_reset),
            ..Self::bare(TagAllocator::new())
        });

        for (id, conn) in &config.connections {
            let is_default = config.default_connection.as_deref() == Some(id.as_str());
            match conn {
                #[cfg(feature = "sqlite")]
                ConnectionConfig::Sqlite { path, wal } => {
                    registry.add_sqlite(id, SqliteOptions::new(path.clone()).with_wal(*wal), is_default);
                }
                #[cfg(not(feature = "sqlite"))]
                ConnectionConfig::Sqlite { .. } => {
                    return Err(BinderyError::Config(format!(
                        "connection {id}: sqlite support is not enabled"
                    )));
                }
            }
        }
        Ok(registry)
    }

    fn bare(tags: TagAllocator) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            default_connection: Mutex::new(None),
            tags,
            tag_prefix: Arc::from(DEFAULT_TAG_PREFIX),
            auto_reset: AtomicBool::new(true),
            error_mode: Mutex::new(ErrorMode::Throw),
            reports: Mutex::new(Vec::new()),
        }
    }

    /// A new session on the default connection.
    #[must_use]
    pub fn session(self: &Arc<Self>) -> Session {
        Session::new(self)
    }

    #[must_use]
    pub fn tags(&self) -> &TagAllocator {
        &self.tags
    }

    #[must_use]
    pub fn tag_prefix(&self) -> Arc<str> {
        Arc::clone(&self.tag_prefix)
    }

    /// Auto-reset flag new sessions start with.
    #[must_use]
    pub fn auto_reset_default(&self) -> bool {
        self.auto_reset.load(Ordering::Relaxed)
    }

    pub fn set_auto_reset_default(&self, on: bool) {
        self.auto_reset.store(on, Ordering::Relaxed);
    }

    /// Register a connection opened by `factory` on first use.
    pub fn add_connection<C, F>(&self, id: &str, factory: F, is_default: bool)
    where
        C: Connection + 'static,
        F: Fn() -> Result<C, BackendError> + Send + Sync + 'static,
    {
        let factory: ConnectionFactory =
            Box::new(move || factory().map(|c| Arc::new(c) as Arc<dyn Connection>));
        self.insert(id, Slot::Pending(factory), is_default);
    }

    /// Register an already open connection.
    pub fn add_connection_instance(&self, id: &str, conn: Arc<dyn Connection>, is_default: bool) {
        self.insert(id, Slot::Open(conn), is_default);
    }

    /// Register a `SQLite` database opened on first use.
    #[cfg(feature = "sqlite")]
    pub fn add_sqlite(&self, id: &str, opts: SqliteOptions, is_default: bool) {
        self.add_connection(id, move || SqliteConnection::open(&opts), is_default);
    }

    fn insert(&self, id: &str, slot: Slot, is_default: bool) {
        let replaced = lock(&self.connections).insert(id.to_string(), slot).is_some();
        tracing::debug!(id, is_default, replaced, "registered connection");
        let mut default = lock(&self.default_connection);
        if is_default || default.is_none() {
            *default = Some(id.to_string());
        }
    }

    #[must_use]
    pub fn has_connection(&self, id: &str) -> bool {
        lock(&self.connections).contains_key(id)
    }

    #[must_use]
    pub fn default_connection(&self) -> Option<String> {
        lock(&self.default_connection).clone()
    }

    /// # Errors
    /// Returns `BinderyError::UnknownConnection` if `id` is not registered.
    pub fn set_default_connection(&self, id: &str) -> Result<(), BinderyError> {
        if !self.has_connection(id) {
            return Err(BinderyError::UnknownConnection(id.to_string()));
        }
        *lock(&self.default_connection) = Some(id.to_string());
        Ok(())
    }

    /// Resolve `id`, or the default when `None`, opening the connection if needed.
    ///
    /// # Errors
    /// `UnknownConnection` for an unregistered id (or no default), `Backend` if opening
    /// fails.
    pub fn connection(&self, id: Option<&str>) -> Result<Arc<dyn Connection>, BinderyError> {
        let id = match id {
            Some(id) => id.to_string(),
            None => self
                .default_connection()
                .ok_or_else(|| BinderyError::UnknownConnection("<default>".into()))?,
        };

        let mut connections = lock(&self.connections);
        let slot = connections
            .get_mut(&id)
            .ok_or_else(|| BinderyError::UnknownConnection(id.clone()))?;
        match slot {
            Slot::Open(conn) => Ok(Arc::clone(conn)),
            Slot::Pending(factory) => {
                let conn = factory()?;
                tracing::debug!(id = %id, "opened connection");
                *slot = Slot::Open(Arc::clone(&conn));
                Ok(conn)
            }
        }
    }

    pub fn set_error_mode(&self, mode: ErrorMode) {
        *lock(&self.error_mode) = mode;
    }

    #[must_use]
    pub fn error_mode(&self) -> ErrorMode {
        lock(&self.error_mode).clone()
    }

    /// Drain the stored outputs of the wrap callback.
    pub fn take_error_reports(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.reports))
    }

    /// Apply the error mode to a backend failure: return it in throw mode, or record the
    /// callback's output in wrap mode.
    ///
    /// # Errors
    /// Returns the failure's error in throw mode.
    pub fn intercept(&self, failure: BackendFailure) -> Result<(), BinderyError> {
        let mode = self.error_mode();
        match mode {
            ErrorMode::Throw => Err(BinderyError::Backend(failure.error)),
            ErrorMode::Wrap(callback) => {
                let report = callback(&failure);
                lock(&self.reports).push(report);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<String> = lock(&self.connections).keys().cloned().collect();
        ids.sort();
        f.debug_struct("Registry")
            .field("connections", &ids)
            .field("default_connection", &self.default_connection())
            .field("tags", &self.tags)
            .field("error_mode", &self.error_mode())
            .finish_non_exhaustive()
    }
}
