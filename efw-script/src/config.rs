//! Bridge configuration.

use crate::bridge::InterpreterBridge;
use crate::error::Result;
use crate::loader::ScriptSource;
use rhai::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default bootstrap script, looked up under the server root.
pub const DEFAULT_BOOTSTRAP_FILE: &str = "efw.server.rhai";

/// Default entry function name.
pub const DEFAULT_ENTRY_POINT: &str = "doPost";

/// Hook run against every interpreter instance before its bootstrap script.
pub type EngineSetup = Arc<dyn Fn(&mut Engine) + Send + Sync>;

/// How concurrent dispatches share interpreter instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One instance; dispatches run one at a time.
    #[default]
    Shared,
    /// One instance per worker thread, bootstrapped on first use.
    PerThread,
}

/// Bridge configuration.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Directory holding the bootstrap script and server-side modules.
    pub server_root: PathBuf,
    /// Directory holding event scripts.
    pub event_root: PathBuf,
    /// Debug flag exposed to scripts as `_isdebug`.
    pub debug: bool,
    /// Bootstrap script name, relative to `server_root`.
    pub bootstrap_file: String,
    /// Entry function invoked by dispatch.
    pub entry_point: String,
    /// Instance sharing strategy.
    pub strategy: Strategy,
    /// Deadline for a single dispatch.
    pub dispatch_timeout: Option<Duration>,
    /// Maximum operations per dispatch.
    pub max_operations: Option<u64>,
    /// Maximum call stack depth.
    pub max_call_depth: usize,
    /// Maximum string length.
    pub max_string_size: usize,
    /// Maximum array size.
    pub max_array_size: usize,
    /// Maximum map size.
    pub max_map_size: usize,
    engine_setup: Vec<EngineSetup>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_root: PathBuf::from("./scripts/server"),
            event_root: PathBuf::from("./scripts/event"),
            debug: false,
            bootstrap_file: DEFAULT_BOOTSTRAP_FILE.to_string(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            strategy: Strategy::Shared,
            dispatch_timeout: None,
            max_operations: None,
            max_call_depth: 64,
            max_string_size: 16 * 1024 * 1024, // 16MB
            max_array_size: 100_000,
            max_map_size: 100_000,
            engine_setup: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Configuration for the given roots and debug flag.
    pub fn new(server_root: impl Into<PathBuf>, event_root: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            server_root: server_root.into(),
            event_root: event_root.into(),
            debug,
            ..Self::default()
        }
    }

    /// Register a hook run against every new interpreter instance.
    pub fn with_engine_setup(mut self, setup: impl Fn(&mut Engine) + Send + Sync + 'static) -> Self {
        self.engine_setup.push(Arc::new(setup));
        self
    }

    /// Path of the bootstrap script.
    pub fn bootstrap_path(&self) -> PathBuf {
        self.server_root.join(&self.bootstrap_file)
    }

    pub(crate) fn engine_setup(&self) -> &[EngineSetup] {
        &self.engine_setup
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("server_root", &self.server_root)
            .field("event_root", &self.event_root)
            .field("debug", &self.debug)
            .field("bootstrap_file", &self.bootstrap_file)
            .field("entry_point", &self.entry_point)
            .field("strategy", &self.strategy)
            .field("dispatch_timeout", &self.dispatch_timeout)
            .field("max_operations", &self.max_operations)
            .field("engine_setup", &self.engine_setup.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`InterpreterBridge`].
#[derive(Debug, Default)]
pub struct BridgeBuilder {
    config: BridgeConfig,
}

impl BridgeBuilder {
    /// Create a builder for the given roots and debug flag.
    pub fn new(server_root: impl Into<PathBuf>, event_root: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            config: BridgeConfig::new(server_root, event_root, debug),
        }
    }

    /// Set the bootstrap script name.
    pub fn bootstrap_file(mut self, name: impl Into<String>) -> Self {
        self.config.bootstrap_file = name.into();
        self
    }

    /// Set the entry function name.
    pub fn entry_point(mut self, name: impl Into<String>) -> Self {
        self.config.entry_point = name.into();
        self
    }

    /// Set the sharing strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Give every dispatch a deadline.
    pub fn dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.config.dispatch_timeout = Some(timeout);
        self
    }

    /// Set maximum operations per dispatch.
    pub fn max_operations(mut self, max: u64) -> Self {
        self.config.max_operations = Some(max);
        self
    }

    /// Disable operation limit.
    pub fn unlimited_operations(mut self) -> Self {
        self.config.max_operations = None;
        self
    }

    /// Set maximum call stack depth.
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    /// Set maximum string size.
    pub fn max_string_size(mut self, size: usize) -> Self {
        self.config.max_string_size = size;
        self
    }

    /// Set maximum array size.
    pub fn max_array_size(mut self, size: usize) -> Self {
        self.config.max_array_size = size;
        self
    }

    /// Set maximum map size.
    pub fn max_map_size(mut self, size: usize) -> Self {
        self.config.max_map_size = size;
        self
    }

    /// Register a hook run against every interpreter instance.
    pub fn engine_setup(mut self, setup: impl Fn(&mut Engine) + Send + Sync + 'static) -> Self {
        self.config = self.config.with_engine_setup(setup);
        self
    }

    /// The configuration built so far.
    pub fn config(self) -> BridgeConfig {
        self.config
    }

    /// Initialize a bridge reading scripts from the filesystem.
    pub fn build(self) -> Result<InterpreterBridge> {
        InterpreterBridge::initialize(self.config)
    }

    /// Initialize a bridge reading scripts through `source`.
    pub fn build_with_source(self, source: Arc<dyn ScriptSource>) -> Result<InterpreterBridge> {
        InterpreterBridge::with_source(self.config, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::new("scripts/server", "scripts/event", false);
        assert_eq!(config.entry_point, "doPost");
        assert_eq!(config.strategy, Strategy::Shared);
        assert_eq!(
            config.bootstrap_path(),
            PathBuf::from("scripts/server/efw.server.rhai")
        );
    }

    #[test]
    fn test_builder() {
        let config = BridgeBuilder::new("s", "e", true)
            .entry_point("handle")
            .strategy(Strategy::PerThread)
            .dispatch_timeout(Duration::from_millis(250))
            .engine_setup(|engine| {
                engine.register_fn("answer", || 42_i64);
            })
            .config();

        assert!(config.debug);
        assert_eq!(config.entry_point, "handle");
        assert_eq!(config.strategy, Strategy::PerThread);
        assert_eq!(config.dispatch_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.engine_setup().len(), 1);
    }

    #[test]
    fn test_strategy_serde() {
        let s: Strategy = serde_json::from_str("\"per_thread\"").unwrap();
        assert_eq!(s, Strategy::PerThread);
    }
}
