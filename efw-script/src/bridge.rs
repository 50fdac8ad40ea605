//! Dispatch strategies over bootstrapped interpreters.

use crate::config::{BridgeBuilder, BridgeConfig, Strategy};
use crate::error::{Result, ScriptError};
use crate::interpreter::{Interpreter, Recipe};
use crate::loader::{FsScriptSource, ScriptSource};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Instant;
use tracing::{error, info, trace, warn};

/// Something that can run the entry function for a payload.
///
/// Implementations guarantee that no two dispatches observe each other's
/// changes to interpreter globals while running.
pub trait Dispatcher: Send + Sync {
    /// Invoke the entry function with `payload` and return its result.
    fn dispatch(&self, payload: &str) -> Result<String>;

    /// Evaluate an auxiliary script in the global scope.
    ///
    /// Functions it declares are visible to later dispatches, including
    /// those served by interpreters created afterwards.
    fn load_script(&self, path: &Path) -> Result<()>;
}

/// One interpreter behind a mutex; dispatches run one at a time.
pub struct SharedInterpreter {
    recipe: Arc<Recipe>,
    instance: Mutex<Interpreter>,
}

impl SharedInterpreter {
    pub(crate) fn new(recipe: Arc<Recipe>) -> Result<Self> {
        let instance = Interpreter::bootstrap(&recipe)?;
        Ok(Self {
            recipe,
            instance: Mutex::new(instance),
        })
    }

    /// Id of the current instance.
    pub fn instance_id(&self) -> u64 {
        self.instance.lock().id()
    }
}

impl Dispatcher for SharedInterpreter {
    fn dispatch(&self, payload: &str) -> Result<String> {
        let waiting = Instant::now();
        let mut instance = self.instance.lock();
        trace!(wait_us = waiting.elapsed().as_micros() as u64, "Acquired shared interpreter");

        let result = instance.dispatch(payload);
        if let Err(e) = &result
            && e.invalidates_instance()
        {
            warn!(instance = instance.id(), error = %e, "Rebuilding shared interpreter after failed dispatch");
            match Interpreter::bootstrap(&self.recipe) {
                Ok(fresh) => *instance = fresh,
                Err(rebuild) => {
                    error!(error = %rebuild, "Failed to rebuild shared interpreter; keeping the old one")
                }
            }
        }
        result
    }

    fn load_script(&self, path: &Path) -> Result<()> {
        let mut instance = self.instance.lock();
        match instance.load_script(&self.recipe.loader, path) {
            Ok(()) => {
                self.recipe.record(path);
                Ok(())
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load script");
                Err(e)
            }
        }
    }
}

type Instances = DashMap<ThreadId, Arc<Mutex<Interpreter>>>;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Leases held by this thread, by pool id. Dropped with the thread.
    static LEASES: RefCell<HashMap<u64, ThreadLease>> = RefCell::new(HashMap::new());
}

/// Removes a thread's instance from its pool when the thread exits.
struct ThreadLease {
    instances: Weak<Instances>,
    thread: ThreadId,
}

impl Drop for ThreadLease {
    fn drop(&mut self) {
        if let Some(instances) = self.instances.upgrade() {
            instances.remove(&self.thread);
        }
    }
}

/// One interpreter per worker thread, bootstrapped on the thread's first
/// dispatch and dropped when the thread exits.
pub struct InterpreterPool {
    id: u64,
    recipe: Arc<Recipe>,
    instances: Arc<Instances>,
    spare: Mutex<Option<Interpreter>>,
}

impl InterpreterPool {
    /// Bootstraps one instance up front so script errors surface at
    /// initialization. The first thread to dispatch adopts it.
    pub(crate) fn new(recipe: Arc<Recipe>) -> Result<Self> {
        let spare = Interpreter::bootstrap(&recipe)?;
        Ok(Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            recipe,
            instances: Arc::new(DashMap::new()),
            spare: Mutex::new(Some(spare)),
        })
    }

    /// Number of live instances, including one not yet adopted by a thread.
    pub fn instance_count(&self) -> usize {
        self.instances.len() + usize::from(self.spare.lock().is_some())
    }

    /// Drop every instance; each thread bootstraps a new one on its next
    /// dispatch.
    pub fn clear(&self) {
        self.spare.lock().take();
        self.instances.clear();
    }

    fn current(&self) -> Result<Arc<Mutex<Interpreter>>> {
        let id = thread::current().id();
        let existing = self.instances.get(&id).map(|entry| entry.value().clone());
        if let Some(instance) = existing {
            return Ok(instance);
        }

        let adopted = self.spare.lock().take();
        let interpreter = match adopted {
            Some(interpreter) => interpreter,
            None => Interpreter::bootstrap(&self.recipe)?,
        };
        let fresh = Arc::new(Mutex::new(interpreter));
        self.instances.insert(id, fresh.clone());
        self.lease(id);
        trace!(instances = self.instances.len(), "Bound interpreter to thread");
        Ok(fresh)
    }

    fn lease(&self, thread: ThreadId) {
        // Fails only while the thread's locals are being torn down; the
        // instance is then evicted on its next failure or by `clear`.
        let _ = LEASES.try_with(|leases| {
            let mut leases = leases.borrow_mut();
            leases.retain(|_, lease| lease.instances.strong_count() > 0);
            leases.entry(self.id).or_insert_with(|| ThreadLease {
                instances: Arc::downgrade(&self.instances),
                thread,
            });
        });
    }
}

impl Dispatcher for InterpreterPool {
    fn dispatch(&self, payload: &str) -> Result<String> {
        let instance = self.current()?;
        let result = instance.lock().dispatch(payload);

        if let Err(e) = &result
            && e.invalidates_instance()
        {
            warn!(error = %e, "Discarding thread interpreter after failed dispatch");
            self.instances.remove(&thread::current().id());
        }
        result
    }

    fn load_script(&self, path: &Path) -> Result<()> {
        let current = self.current()?;
        if let Err(e) = current.lock().load_script(&self.recipe.loader, path) {
            error!(path = %path.display(), error = %e, "Failed to load script");
            return Err(e);
        }
        self.recipe.record(path);

        // Other threads' instances either take the script now or are
        // rebuilt from the recipe on their next dispatch.
        let others: Vec<(ThreadId, Arc<Mutex<Interpreter>>)> = self
            .instances
            .iter()
            .filter(|entry| !Arc::ptr_eq(entry.value(), &current))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (owner, instance) in others {
            if let Err(e) = instance.lock().load_script(&self.recipe.loader, path) {
                warn!(?owner, error = %e, "Discarding interpreter that failed to load script");
                self.instances.remove(&owner);
            }
        }
        Ok(())
    }
}

/// The interpreter bridge: the configured [`Strategy`] behind one
/// [`Dispatcher`].
pub enum InterpreterBridge {
    /// See [`SharedInterpreter`].
    Shared(SharedInterpreter),
    /// See [`InterpreterPool`].
    PerThread(InterpreterPool),
}

impl InterpreterBridge {
    /// Start building a bridge.
    pub fn builder(
        server_root: impl Into<PathBuf>,
        event_root: impl Into<PathBuf>,
        debug: bool,
    ) -> BridgeBuilder {
        BridgeBuilder::new(server_root, event_root, debug)
    }

    /// Bind globals and evaluate the bootstrap script, reading scripts from
    /// the filesystem.
    ///
    /// Fails with [`ScriptError::Init`] if the bootstrap script cannot be
    /// read or evaluated.
    pub fn initialize(config: BridgeConfig) -> Result<Self> {
        Self::with_source(config, Arc::new(FsScriptSource))
    }

    /// Like [`initialize`](Self::initialize), reading scripts through
    /// `source`.
    pub fn with_source(config: BridgeConfig, source: Arc<dyn ScriptSource>) -> Result<Self> {
        if config.entry_point.is_empty() {
            return Err(ScriptError::config("entry point name is empty"));
        }

        let strategy = config.strategy;
        let root = config.server_root.clone();
        let recipe = Arc::new(Recipe::new(config, source));

        let bridge = match strategy {
            Strategy::Shared => InterpreterBridge::Shared(SharedInterpreter::new(recipe)?),
            Strategy::PerThread => InterpreterBridge::PerThread(InterpreterPool::new(recipe)?),
        };

        info!(?strategy, root = %root.display(), "Interpreter bridge initialized");
        Ok(bridge)
    }

    /// The strategy in use.
    pub fn strategy(&self) -> Strategy {
        match self {
            InterpreterBridge::Shared(_) => Strategy::Shared,
            InterpreterBridge::PerThread(_) => Strategy::PerThread,
        }
    }

    fn inner(&self) -> &dyn Dispatcher {
        match self {
            InterpreterBridge::Shared(shared) => shared,
            InterpreterBridge::PerThread(pool) => pool,
        }
    }
}

impl Dispatcher for InterpreterBridge {
    fn dispatch(&self, payload: &str) -> Result<String> {
        self.inner().dispatch(payload)
    }

    fn load_script(&self, path: &Path) -> Result<()> {
        self.inner().load_script(path)
    }
}

impl std::fmt::Debug for InterpreterBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterBridge")
            .field("strategy", &self.strategy())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryScriptSource;

    fn source(bootstrap: &str) -> Arc<dyn ScriptSource> {
        Arc::new(MemoryScriptSource::new().with_file("/srv/efw.server.rhai", bootstrap))
    }

    #[test]
    fn test_shared_rebuilds_after_failure() {
        let bridge = InterpreterBridge::builder("/srv", "/evt", false)
            .build_with_source(source(
                r#"fn doPost(req) { if req == "fail" { throw "bad request"; } req }"#,
            ))
            .unwrap();
        let InterpreterBridge::Shared(shared) = &bridge else {
            panic!("expected shared strategy");
        };

        let before = shared.instance_id();
        assert!(bridge.dispatch("fail").is_err());
        assert_ne!(shared.instance_id(), before);
        assert_eq!(bridge.dispatch("ok").unwrap(), "ok");
    }

    #[test]
    fn test_pool_discards_failed_instance() {
        let bridge = InterpreterBridge::builder("/srv", "/evt", false)
            .strategy(Strategy::PerThread)
            .build_with_source(source("fn doPost(req) { if req == \"int\" { 1 } else { req } }"))
            .unwrap();
        let InterpreterBridge::PerThread(pool) = &bridge else {
            panic!("expected per-thread strategy");
        };

        assert_eq!(pool.instance_count(), 1);
        assert!(matches!(
            bridge.dispatch("int"),
            Err(ScriptError::InvalidOutput { .. })
        ));
        assert_eq!(pool.instance_count(), 0);
        assert_eq!(bridge.dispatch("again").unwrap(), "again");
        assert_eq!(pool.instance_count(), 1);
    }

    #[test]
    fn test_missing_entry_point_keeps_instance() {
        let bridge = InterpreterBridge::builder("/srv", "/evt", false)
            .build_with_source(source("fn other() {}"))
            .unwrap();
        let InterpreterBridge::Shared(shared) = &bridge else {
            panic!("expected shared strategy");
        };
        let before = shared.instance_id();
        assert!(matches!(
            bridge.dispatch("x"),
            Err(ScriptError::EntryPointMissing { .. })
        ));
        assert_eq!(shared.instance_id(), before);
    }

    #[test]
    fn test_empty_entry_point_rejected() {
        let err = InterpreterBridge::builder("/srv", "/evt", false)
            .entry_point("")
            .build_with_source(source("fn doPost(req) { req }"))
            .unwrap_err();
        assert!(matches!(err, ScriptError::Config { .. }));
    }
}
