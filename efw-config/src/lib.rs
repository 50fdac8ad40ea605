// Configuration source for the efw runtime

pub mod env;
pub mod error;
pub mod keys;
pub mod loader;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Read access to named string configuration values.
///
/// This is the only view of configuration the runtime components take;
/// anything that can answer "what is the value of key K" can drive them.
pub trait PropertySource: Send + Sync {
    /// Value of `key`, if configured.
    fn property(&self, key: &str) -> Option<String>;

    /// Value of `key`, or `default` when it is absent.
    fn property_or(&self, key: &str, default: &str) -> String {
        self.property(key).unwrap_or_else(|| default.to_string())
    }
}

impl PropertySource for HashMap<String, String> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<P: PropertySource + ?Sized> PropertySource for Arc<P> {
    fn property(&self, key: &str) -> Option<String> {
        (**self).property(key)
    }
}

/// Main configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: None,
        }
    }

    /// Only environment variables starting with `prefix_` are loaded.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let env_vars = loader.load()?;

        let mut config = self.config.write();
        for (key, value) in env_vars {
            config.insert(key, Value::String(value));
        }

        Ok(())
    }

    /// Load a `.env` file into the process environment, then load the
    /// environment. A missing default `.env` is not an error.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        if let Some(path) = path {
            dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
        } else {
            dotenvy::dotenv().ok();
        }
        self.load_env()
    }

    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        self.merge_value(data);
        Ok(())
    }

    /// Load a file, choosing the format from its extension.
    pub fn load_file_auto(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = ConfigLoader::auto(path)?.load_file(path)?;
        self.merge_value(data);
        Ok(())
    }

    fn merge_value(&self, data: Value) {
        if let Value::Object(map) = data {
            let mut config = self.config.write();
            for (key, value) in map {
                config.insert(key, value);
            }
        }
    }

    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.config.write().insert(key.to_string(), json_value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    pub fn merge(&self, other: &ConfigManager) {
        let other_config = other.config.read().clone();
        let mut config = self.config.write();
        config.extend(other_config);
    }

    /// Find `key` as a flat entry first, then as a dotted path through
    /// nested tables, so `efw.jdbc.resource` resolves from both a property
    /// file and a `[efw.jdbc]` TOML table.
    fn lookup(&self, key: &str) -> Option<Value> {
        let config = self.config.read();
        if let Some(value) = config.get(key) {
            return Some(value.clone());
        }

        let mut segments = key.split('.');
        let mut current = config.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertySource for ConfigManager {
    fn property(&self, key: &str) -> Option<String> {
        match self.lookup(key)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
