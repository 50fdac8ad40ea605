//! The resource registry.

use crate::config::{ResolutionMode, ResourceConfig};
use crate::context::{ConnectionContext, Database};
use crate::resolver::{NamingResolver, Resolver, StaticResolver};
use crate::source::{DataSource, Driver, NamingService};
use crate::{DbError, DbResult};
use efw_config::PropertySource;
use efw_log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// External service the registry resolves data sources through.
///
/// Must match the [`ResolutionMode`] of the configuration.
#[derive(Clone)]
pub enum Backend {
    /// Naming service for web mode.
    Naming(Arc<dyn NamingService>),
    /// Driver for batch mode.
    Driver(Arc<dyn Driver>),
}

/// Resolves resource names to data sources and opens connections into
/// request-owned [`ConnectionContext`]s.
///
/// The registry itself is immutable after [`initialize`](Self::initialize)
/// and can be shared across worker threads.
pub struct ResourceRegistry {
    default_resource: String,
    default_source: Arc<dyn DataSource>,
    resolver: Box<dyn Resolver>,
    connect_timeout: Duration,
}

impl ResourceRegistry {
    /// Build the registry from `config`.
    ///
    /// Web mode resolves the default resource through the naming service
    /// now; batch mode builds a data source for every descriptor. Fails
    /// with [`DbError::Configuration`] if the default resource cannot be
    /// resolved or `backend` does not match the configured mode.
    pub fn initialize(config: ResourceConfig, backend: Backend) -> DbResult<Self> {
        let resolver: Box<dyn Resolver> = match (&config.mode, backend) {
            (ResolutionMode::Web { naming_root }, Backend::Naming(naming)) => {
                Box::new(NamingResolver::new(naming, naming_root.clone()))
            }
            (ResolutionMode::Batch { descriptors }, Backend::Driver(driver)) => {
                Box::new(StaticResolver::from_descriptors(descriptors, driver))
            }
            (ResolutionMode::Web { .. }, Backend::Driver(_)) => {
                return Err(DbError::Configuration(
                    "web mode requires a naming service".into(),
                ));
            }
            (ResolutionMode::Batch { .. }, Backend::Naming(_)) => {
                return Err(DbError::Configuration("batch mode requires a driver".into()));
            }
        };

        let default_source = resolver.resolve(&config.default_resource).map_err(|e| {
            DbError::Configuration(format!(
                "default resource {} could not be resolved: {}",
                config.default_resource, e
            ))
        })?;

        info!(
            "Resource registry initialized ({} mode, default {})",
            if config.is_web() { "web" } else { "batch" },
            config.default_resource
        );

        Ok(Self {
            default_resource: config.default_resource,
            default_source,
            resolver,
            connect_timeout: config.connect_timeout,
        })
    }

    /// Web-mode registry configured from properties.
    pub fn web(
        props: &(impl PropertySource + ?Sized),
        naming: Arc<dyn NamingService>,
    ) -> DbResult<Self> {
        Self::initialize(ResourceConfig::web_from(props), Backend::Naming(naming))
    }

    /// Batch-mode registry configured from properties.
    pub fn batch(props: &(impl PropertySource + ?Sized), driver: Arc<dyn Driver>) -> DbResult<Self> {
        Self::initialize(ResourceConfig::batch_from(props)?, Backend::Driver(driver))
    }

    /// Name used when no resource name is given.
    pub fn default_resource(&self) -> &str {
        &self.default_resource
    }

    /// The name `name` refers to: itself, or the default when empty/absent.
    pub fn resource_name<'a>(&'a self, name: Option<&'a str>) -> &'a str {
        match name {
            Some(n) if !n.is_empty() => n,
            _ => &self.default_resource,
        }
    }

    /// Open a connection for `name` into `ctx`.
    ///
    /// An empty or absent name opens the default resource through the
    /// source resolved at startup; any other name is resolved again on
    /// every call.
    ///
    /// If `ctx` already holds a connection for the name, the new
    /// connection is opened first and the old one is closed afterwards;
    /// when opening fails the old connection stays in place.
    pub fn open<'c>(
        &self,
        ctx: &'c mut ConnectionContext,
        name: Option<&str>,
    ) -> DbResult<&'c mut Database> {
        let resource = self.resource_name(name).to_string();

        let source = if name.is_none_or(str::is_empty) {
            self.default_source.clone()
        } else {
            self.resolver.resolve(&resource)?
        };

        let connection = source
            .connection(self.connect_timeout)
            .map_err(|e| DbError::connection(resource.clone(), e))?;
        let database = Database::new(resource.clone(), connection);
        debug!("Opened connection {} for {}", database.id(), resource);

        if let Some(previous) = ctx.insert(database) {
            warn!(
                "Connection {} for {} replaced by a new open; closing it",
                previous.id(),
                resource
            );
            if let Err(e) = previous.close() {
                warn!("Failed to close replaced connection for {}: {}", resource, e);
            }
        }

        ctx.get_mut(&resource)
            .ok_or_else(|| DbError::not_found(resource.clone()))
    }

    /// The connection `ctx` holds for `name`; never opens one.
    pub fn get<'c>(&self, ctx: &'c ConnectionContext, name: Option<&str>) -> Option<&'c Database> {
        ctx.get(self.resource_name(name))
    }

    /// Mutable form of [`get`](Self::get).
    pub fn get_mut<'c>(
        &self,
        ctx: &'c mut ConnectionContext,
        name: Option<&str>,
    ) -> Option<&'c mut Database> {
        ctx.get_mut(self.resource_name(name))
    }

    /// Close every connection in `ctx`. See [`ConnectionContext::close_all`].
    pub fn close_all(&self, ctx: &mut ConnectionContext) -> DbResult<()> {
        let count = ctx.len();
        let result = ctx.close_all();
        debug!("Closed {} connection(s)", count);
        result
    }

    /// Run `f` with a fresh context and close it afterwards, whatever `f`
    /// returns.
    ///
    /// An error from `f` takes precedence over a close failure, which is
    /// then only logged.
    pub fn scope<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut ConnectionContext) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut ctx = ConnectionContext::new();
        let result = f(&mut ctx);
        let closed = self.close_all(&mut ctx);

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!("Ignoring close failure after request error: {}", close_err);
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("default_resource", &self.default_resource)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
