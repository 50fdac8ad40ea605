//! Collaborator seams: connections, data sources, drivers and naming.
//!
//! The registry never talks to a database itself. It asks a
//! [`DataSource`] for connections and a [`NamingService`] (web mode) or a
//! [`Driver`] (batch mode) for data sources.

use crate::config::DataSourceDescriptor;
use crate::error::BoxError;
use efw_log::debug;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// An open database connection.
///
/// Implementations are owned by exactly one request context at a time.
/// Callers reach the concrete type through [`crate::Database::downcast_mut`].
pub trait Connection: Any + Send {
    /// Close the connection. Called at most once by the registry.
    fn close(&mut self) -> Result<(), BoxError>;

    /// Whether the connection has been closed.
    fn is_closed(&self) -> bool {
        false
    }
}

/// A thread-safe factory of connections.
pub trait DataSource: Send + Sync {
    /// Produce a new connection, giving up after `timeout`.
    fn connection(&self, timeout: Duration) -> Result<Box<dyn Connection>, BoxError>;
}

/// Opens connections from a static locator and credential pair.
pub trait Driver: Send + Sync {
    /// Connect to `url`, giving up after `timeout`.
    fn connect(
        &self,
        url: &str,
        username: Option<&str>,
        password: Option<&str>,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, BoxError>;
}

/// Resolves fully qualified names to data sources.
pub trait NamingService: Send + Sync {
    /// Look up `name`; `None` when nothing is bound there.
    fn lookup(&self, name: &str) -> Option<Arc<dyn DataSource>>;
}

/// A data source built from a [`DataSourceDescriptor`] and a [`Driver`].
pub struct StaticDataSource {
    descriptor: DataSourceDescriptor,
    driver: Arc<dyn Driver>,
}

impl StaticDataSource {
    /// Create a data source for `descriptor`.
    pub fn new(descriptor: DataSourceDescriptor, driver: Arc<dyn Driver>) -> Self {
        Self { descriptor, driver }
    }

    /// The descriptor this source connects with.
    pub fn descriptor(&self) -> &DataSourceDescriptor {
        &self.descriptor
    }
}

impl DataSource for StaticDataSource {
    fn connection(&self, timeout: Duration) -> Result<Box<dyn Connection>, BoxError> {
        self.driver.connect(
            &self.descriptor.url,
            self.descriptor.username.as_deref(),
            self.descriptor.password.as_deref(),
            timeout,
        )
    }
}

impl fmt::Debug for StaticDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticDataSource")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// In-process naming service.
///
/// Binds data sources under fully qualified names such as
/// `java:comp/env/jdbc/efw`.
#[derive(Default, Clone)]
pub struct MemoryNamingService {
    bindings: Arc<RwLock<HashMap<String, Arc<dyn DataSource>>>>,
}

impl MemoryNamingService {
    /// Create an empty naming service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `source` under `name`, replacing any previous binding.
    pub fn bind(&self, name: impl Into<String>, source: Arc<dyn DataSource>) {
        let name = name.into();
        debug!("Binding data source at {}", name);
        self.bindings.write().insert(name, source);
    }

    /// Remove the binding at `name`. Returns whether one existed.
    pub fn unbind(&self, name: &str) -> bool {
        self.bindings.write().remove(name).is_some()
    }

    /// Bound names, unordered.
    pub fn names(&self) -> Vec<String> {
        self.bindings.read().keys().cloned().collect()
    }
}

impl NamingService for MemoryNamingService {
    fn lookup(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.bindings.read().get(name).cloned()
    }
}
