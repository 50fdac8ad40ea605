//! Resource name resolution.

use crate::config::DataSourceDescriptor;
use crate::source::{DataSource, Driver, NamingService, StaticDataSource};
use crate::{DbError, DbResult};
use efw_log::{debug, trace};
use std::collections::HashMap;
use std::sync::Arc;

/// Turns a resource name into a data source.
pub trait Resolver: Send + Sync {
    /// Resolve `name`, failing with [`DbError::ResourceNotFound`].
    fn resolve(&self, name: &str) -> DbResult<Arc<dyn DataSource>>;
}

/// Web-mode resolution: one naming-service lookup per call, no caching.
pub struct NamingResolver {
    naming: Arc<dyn NamingService>,
    root: String,
    scheme_marker: String,
}

impl NamingResolver {
    /// Resolve bare names under `root`.
    ///
    /// The scheme of `root` (everything up to and including its first
    /// `:`) marks a name as already fully qualified.
    pub fn new(naming: Arc<dyn NamingService>, root: impl Into<String>) -> Self {
        let root = root.into().trim_end_matches('/').to_string();
        let scheme_marker = root
            .find(':')
            .map(|idx| root[..=idx].to_string())
            .unwrap_or_default();
        Self {
            naming,
            root,
            scheme_marker,
        }
    }

    /// The name handed to the naming service for `name`.
    pub fn qualify(&self, name: &str) -> String {
        if !self.scheme_marker.is_empty() && name.contains(&self.scheme_marker) {
            name.to_string()
        } else {
            format!("{}/{}", self.root, name)
        }
    }
}

impl Resolver for NamingResolver {
    fn resolve(&self, name: &str) -> DbResult<Arc<dyn DataSource>> {
        let qualified = self.qualify(name);
        trace!("Looking up {} as {}", name, qualified);
        self.naming
            .lookup(&qualified)
            .ok_or_else(|| DbError::not_found(name))
    }
}

/// Batch-mode resolution: a lookup in sources built once at startup.
pub struct StaticResolver {
    sources: HashMap<String, Arc<dyn DataSource>>,
}

impl StaticResolver {
    /// Build one [`StaticDataSource`] per descriptor. A later descriptor
    /// with a duplicate name replaces the earlier one.
    pub fn from_descriptors(descriptors: &[DataSourceDescriptor], driver: Arc<dyn Driver>) -> Self {
        let sources = descriptors
            .iter()
            .map(|descriptor| {
                debug!("Registering batch data source {}", descriptor.name);
                let source: Arc<dyn DataSource> =
                    Arc::new(StaticDataSource::new(descriptor.clone(), driver.clone()));
                (descriptor.name.clone(), source)
            })
            .collect();
        Self { sources }
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no sources are registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self, name: &str) -> DbResult<Arc<dyn DataSource>> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::not_found(name))
    }
}
