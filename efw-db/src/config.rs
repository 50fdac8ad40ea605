//! Data-source configuration.
//!
//! A [`ResourceConfig`] is built once at startup by one of the two
//! bootstrap paths and handed to the registry. It never changes afterwards.

use crate::{DbError, DbResult};
use efw_config::{PropertySource, keys};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Naming root bare resource names are resolved under in web mode.
pub const DEFAULT_NAMING_ROOT: &str = "java:comp/env";

/// A statically configured data source (batch mode).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    /// Resource name the source is registered under.
    pub name: String,
    /// Opaque connection locator handed to the driver.
    pub url: String,
    /// Optional user name.
    #[serde(default)]
    pub username: Option<String>,
    /// Optional password.
    #[serde(default)]
    pub password: Option<String>,
}

impl DataSourceDescriptor {
    /// Create a descriptor without credentials.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Attach a credential pair.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for DataSourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceDescriptor")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// How resource names are turned into data sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ResolutionMode {
    /// Look every name up in a naming service.
    Web {
        /// Root that bare names are resolved under.
        #[serde(default = "default_naming_root")]
        naming_root: String,
    },
    /// Resolve every descriptor once at startup and cache the result.
    Batch {
        /// Configured sources in index order; the first is the default.
        descriptors: Vec<DataSourceDescriptor>,
    },
}

/// Process-wide data-source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Name used when a caller passes no resource name.
    pub default_resource: String,

    /// Resolution strategy, fixed for the life of the process.
    #[serde(flatten)]
    pub mode: ResolutionMode,

    /// Deadline handed to the data source on every connection request.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "secs_serde")]
    pub connect_timeout: Duration,
}

fn default_naming_root() -> String {
    DEFAULT_NAMING_ROOT.to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

impl ResourceConfig {
    /// Web-mode configuration for `default_resource` under the default
    /// naming root.
    pub fn web(default_resource: impl Into<String>) -> Self {
        Self {
            default_resource: default_resource.into(),
            mode: ResolutionMode::Web {
                naming_root: default_naming_root(),
            },
            connect_timeout: default_connect_timeout(),
        }
    }

    /// Batch-mode configuration; the first descriptor is the default.
    pub fn batch(descriptors: Vec<DataSourceDescriptor>) -> DbResult<Self> {
        let default_resource = descriptors
            .first()
            .map(|d| d.name.clone())
            .ok_or_else(|| DbError::Configuration("no batch data sources configured".into()))?;

        Ok(Self {
            default_resource,
            mode: ResolutionMode::Batch { descriptors },
            connect_timeout: default_connect_timeout(),
        })
    }

    /// Web-mode configuration from properties.
    ///
    /// Reads `efw.jdbc.resource`, defaulting to `jdbc/efw`.
    pub fn web_from(props: &(impl PropertySource + ?Sized)) -> Self {
        Self::web(props.property_or(keys::JDBC_RESOURCE, keys::DEFAULT_JDBC_RESOURCE))
    }

    /// Batch-mode configuration from properties.
    ///
    /// Reads `efw.jdbc.resource`, `efw.jdbc.resource.1`, ... together with
    /// the matching `url`, `username` and `password` keys, and stops at the
    /// first index whose resource name is missing or empty. Keys beyond
    /// that gap are ignored.
    pub fn batch_from(props: &(impl PropertySource + ?Sized)) -> DbResult<Self> {
        let mut descriptors = Vec::new();

        for idx in 0.. {
            let name = props
                .property(&keys::indexed(keys::JDBC_RESOURCE, idx))
                .unwrap_or_default();
            if name.is_empty() {
                break;
            }

            let optional = |base: &str| {
                props
                    .property(&keys::indexed(base, idx))
                    .filter(|v| !v.is_empty())
            };

            descriptors.push(DataSourceDescriptor {
                name,
                url: props
                    .property(&keys::indexed(keys::JDBC_RESOURCE_URL, idx))
                    .unwrap_or_default(),
                username: optional(keys::JDBC_RESOURCE_USERNAME),
                password: optional(keys::JDBC_RESOURCE_PASSWORD),
            });
        }

        Self::batch(descriptors)
    }

    /// Set the naming root (web mode only; ignored in batch mode).
    pub fn naming_root(mut self, root: impl Into<String>) -> Self {
        if let ResolutionMode::Web { naming_root } = &mut self.mode {
            *naming_root = root.into();
        }
        self
    }

    /// Set the connection deadline.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Whether names are resolved through a naming service.
    pub fn is_web(&self) -> bool {
        matches!(self.mode, ResolutionMode::Web { .. })
    }
}

mod secs_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
