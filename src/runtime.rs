//! Request handling: registry scope around a script dispatch.

use crate::bindings::register_db_api;
use crate::error::Result;
use efw_db::{RequestScope, ResourceRegistry};
use efw_log::{debug, warn};
use efw_script::{BridgeConfig, Dispatcher, InterpreterBridge, ScriptSource};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// A resource registry and an interpreter bridge wired together.
///
/// Shared by every worker thread; each [`handle`](Self::handle) call is one
/// request.
pub struct Runtime {
    registry: Arc<ResourceRegistry>,
    bridge: InterpreterBridge,
}

impl Runtime {
    /// Wire an already initialized bridge to `registry`.
    ///
    /// Scripts only reach the registry if the bridge was configured with
    /// [`register_db_api`](crate::register_db_api); prefer
    /// [`initialize`](Self::initialize).
    pub fn new(registry: Arc<ResourceRegistry>, bridge: InterpreterBridge) -> Self {
        Self { registry, bridge }
    }

    /// Initialize the bridge from `config` with the `db_*` script functions
    /// bound to `registry`.
    pub fn initialize(registry: Arc<ResourceRegistry>, config: BridgeConfig) -> Result<Self> {
        let config = config.with_engine_setup(register_db_api(registry.clone()));
        let bridge = InterpreterBridge::initialize(config)?;
        Ok(Self::new(registry, bridge))
    }

    /// Like [`initialize`](Self::initialize), reading scripts through
    /// `source`.
    pub fn with_source(
        registry: Arc<ResourceRegistry>,
        config: BridgeConfig,
        source: Arc<dyn ScriptSource>,
    ) -> Result<Self> {
        let config = config.with_engine_setup(register_db_api(registry.clone()));
        let bridge = InterpreterBridge::with_source(config, source)?;
        Ok(Self::new(registry, bridge))
    }

    /// The resource registry.
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// The interpreter bridge.
    pub fn bridge(&self) -> &InterpreterBridge {
        &self.bridge
    }

    /// Evaluate an auxiliary script on the bridge.
    pub fn load_script(&self, path: impl AsRef<Path>) -> Result<()> {
        Ok(self.bridge.load_script(path.as_ref())?)
    }

    /// Serve one request: dispatch `payload` inside a fresh request scope
    /// and close every connection the script opened.
    ///
    /// A dispatch error is returned in preference to a close error.
    pub fn handle(&self, payload: &str) -> Result<String> {
        let started = Instant::now();
        let scope = RequestScope::enter()?;

        let result = self.bridge.dispatch(payload);
        let closed = scope.finish();
        debug!(
            "Request handled in {}us ({})",
            started.elapsed().as_micros(),
            if result.is_ok() { "ok" } else { "failed" }
        );

        match (result, closed) {
            (Ok(reply), Ok(())) => Ok(reply),
            (Ok(_), Err(close_err)) => Err(close_err.into()),
            (Err(err), Ok(())) => Err(err.into()),
            (Err(err), Err(close_err)) => {
                warn!("Ignoring close failure after dispatch error: {}", close_err);
                Err(err.into())
            }
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("bridge", &self.bridge)
            .finish()
    }
}
