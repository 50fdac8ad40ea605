// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Loads configuration from environment variables.
///
/// With a prefix, only `PREFIX_*` variables are taken. Keys are
/// lower-cased and `_` becomes `.`, so `EFW_JDBC_RESOURCE` maps to the
/// property `efw.jdbc.resource`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Collect all matching variables as property keys.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(env::vars()
            .filter(|(var, _)| self.accepts(var))
            .map(|(var, value)| (Self::property_key(&var), value))
            .collect())
    }

    /// Read the variable behind property `key`, in the same key space as
    /// [`load`](Self::load): `efw.jdbc.resource` reads `EFW_JDBC_RESOURCE`.
    ///
    /// Variables outside the prefix are reported as not present.
    pub fn load_var(&self, key: &str) -> Result<String> {
        let var = Self::var_name(key);
        if !self.accepts(&var) {
            return Err(ConfigError::EnvError(env::VarError::NotPresent));
        }
        env::var(&var).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    fn accepts(&self, var: &str) -> bool {
        match &self.prefix {
            Some(prefix) => var
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('_') && rest.len() > 1),
            None => true,
        }
    }

    fn property_key(var: &str) -> String {
        var.to_lowercase().replace('_', ".")
    }

    fn var_name(key: &str) -> String {
        key.to_uppercase().replace('.', "_")
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
