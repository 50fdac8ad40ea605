//! A single bootstrapped interpreter instance.

use crate::bindings::{EngineHandle, register_host_api};
use crate::config::BridgeConfig;
use crate::error::{Result, ScriptError};
use crate::loader::{ScriptLoader, ScriptSource};
use rhai::module_resolvers::FileModuleResolver;
use rhai::{AST, CallFnOptions, Dynamic, Engine, EvalAltResult, Scope};
#[cfg(test)]
use rhai::Variant;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Operations between deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

thread_local! {
    static DEADLINE: Cell<Option<Instant>> = const { Cell::new(None) };
}

/// Clears the thread's dispatch deadline when dropped.
struct DeadlineGuard;

impl DeadlineGuard {
    fn set(timeout: Option<Duration>) -> Self {
        DEADLINE.with(|d| d.set(timeout.map(|t| Instant::now() + t)));
        DeadlineGuard
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        DEADLINE.with(|d| d.set(None));
    }
}

/// Everything needed to build an equivalent interpreter from scratch.
pub(crate) struct Recipe {
    pub(crate) config: BridgeConfig,
    pub(crate) loader: ScriptLoader,
    scripts: parking_lot::RwLock<Vec<PathBuf>>,
}

impl Recipe {
    pub(crate) fn new(config: BridgeConfig, source: Arc<dyn ScriptSource>) -> Self {
        let loader = ScriptLoader::new(config.server_root.clone(), source);
        Self {
            config,
            loader,
            scripts: parking_lot::RwLock::new(Vec::new()),
        }
    }

    /// Record an auxiliary script so later instances replay it.
    pub(crate) fn record(&self, path: &Path) {
        self.scripts.write().push(path.to_path_buf());
    }

    pub(crate) fn scripts(&self) -> Vec<PathBuf> {
        self.scripts.read().clone()
    }
}

/// One interpreter: engine, global scope and the functions declared by
/// every script evaluated so far.
pub(crate) struct Interpreter {
    id: u64,
    engine: Engine,
    scope: Scope<'static>,
    functions: AST,
    entry_point: String,
    dispatch_timeout: Option<Duration>,
    max_operations: Option<u64>,
}

impl Interpreter {
    /// Build an instance from `recipe`: bind globals, evaluate the
    /// bootstrap script, then replay recorded auxiliary scripts.
    #[instrument(skip(recipe), fields(root = %recipe.config.server_root.display()))]
    pub(crate) fn bootstrap(recipe: &Recipe) -> Result<Self> {
        let config = &recipe.config;
        let id = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);

        let mut engine = Engine::new();
        if let Some(max_ops) = config.max_operations {
            engine.set_max_operations(max_ops);
        }
        engine.set_max_call_levels(config.max_call_depth);
        engine.set_max_string_size(config.max_string_size);
        engine.set_max_array_size(config.max_array_size);
        engine.set_max_map_size(config.max_map_size);
        engine.set_module_resolver(FileModuleResolver::new_with_path(&config.server_root));
        engine.on_progress(|ops| {
            if ops % DEADLINE_CHECK_INTERVAL != 0 {
                return None;
            }
            match DEADLINE.with(Cell::get) {
                Some(deadline) if Instant::now() >= deadline => Some(Dynamic::from("timeout")),
                _ => None,
            }
        });

        register_host_api(&mut engine, config);
        for setup in config.engine_setup() {
            setup(&mut engine);
        }

        let mut scope = Scope::new();
        scope.push_constant("_serverfolder", config.server_root.display().to_string());
        scope.push_constant("_eventfolder", config.event_root.display().to_string());
        scope.push_constant("_isdebug", config.debug);
        scope.push_constant("_engine", EngineHandle::new(id, config));

        let mut interpreter = Self {
            id,
            engine,
            scope,
            functions: AST::empty(),
            entry_point: config.entry_point.clone(),
            dispatch_timeout: config.dispatch_timeout,
            max_operations: config.max_operations,
        };

        let bootstrap = PathBuf::from(&config.bootstrap_file);
        interpreter
            .evaluate(&recipe.loader, &bootstrap)
            .map_err(ScriptError::init)?;
        for script in recipe.scripts() {
            interpreter
                .evaluate(&recipe.loader, &script)
                .map_err(ScriptError::init)?;
        }

        debug!(instance = id, "Interpreter bootstrapped");
        Ok(interpreter)
    }

    /// Process-unique id of this instance.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[cfg(test)]
    fn global<T: Variant + Clone>(&self, name: &str) -> Option<T> {
        self.scope.get_value(name)
    }

    /// Read and evaluate a script in the global scope.
    #[instrument(skip(self, loader), fields(instance = self.id))]
    pub(crate) fn load_script(&mut self, loader: &ScriptLoader, path: &Path) -> Result<()> {
        self.evaluate(loader, path)
    }

    fn evaluate(&mut self, loader: &ScriptLoader, path: &Path) -> Result<()> {
        let (full_path, source) = loader.load(path)?;

        let mut ast = self
            .engine
            .compile(&source)
            .map_err(|e| ScriptError::compilation(&full_path, e.to_string()))?;
        ast.set_source(full_path.display().to_string());

        // Top-level code sees functions from earlier scripts; later
        // definitions replace earlier ones with the same signature.
        let mut merged = self.functions.clone();
        merged.combine(ast);

        self.engine
            .run_ast_with_scope(&mut self.scope, &merged)
            .map_err(|e| ScriptError::runtime(&full_path, e.to_string()))?;

        merged.clear_statements();
        self.functions = merged;
        debug!(path = %full_path.display(), "Script evaluated");
        Ok(())
    }

    /// Call the entry function with `payload` and return its text result.
    #[instrument(skip(self, payload), fields(instance = self.id, len = payload.len()))]
    pub(crate) fn dispatch(&mut self, payload: &str) -> Result<String> {
        let _deadline = DeadlineGuard::set(self.dispatch_timeout);
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);

        let result = self
            .engine
            .call_fn_with_options::<Dynamic>(
                options,
                &mut self.scope,
                &self.functions,
                &self.entry_point,
                (payload.to_string(),),
            )
            .map_err(|e| self.classify(*e))?;

        let actual = result.type_name();
        result.into_string().map_err(|_| ScriptError::InvalidOutput {
            expected: "string".to_string(),
            actual: actual.to_string(),
        })
    }

    fn classify(&self, err: EvalAltResult) -> ScriptError {
        match err {
            // Raised for the entry call itself; failed calls made by the
            // script carry a signature and a position.
            EvalAltResult::ErrorFunctionNotFound(ref name, pos)
                if pos.is_none() && name == &self.entry_point =>
            {
                ScriptError::EntryPointMissing {
                    name: self.entry_point.clone(),
                }
            }
            EvalAltResult::ErrorTerminated(..) => ScriptError::Timeout {
                timeout_ms: self
                    .dispatch_timeout
                    .map(|t| t.as_millis() as u64)
                    .unwrap_or_default(),
            },
            EvalAltResult::ErrorTooManyOperations(_) => ScriptError::OperationLimit {
                max_ops: self.max_operations.unwrap_or_default(),
            },
            other => ScriptError::Dispatch {
                message: other.to_string(),
            },
        }
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("id", &self.id)
            .field("entry_point", &self.entry_point)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryScriptSource;

    fn recipe(bootstrap: &str) -> Recipe {
        let source = MemoryScriptSource::new().with_file("/srv/efw.server.rhai", bootstrap);
        Recipe::new(BridgeConfig::new("/srv", "/evt", true), Arc::new(source))
    }

    #[test]
    fn test_globals_are_bound() {
        let recipe = recipe(
            r#"
            const ROOT = _serverfolder;
            const MODE = if _isdebug { "debug" } else { "prod" };
            const SELF = _engine.instance;
            "#,
        );
        let interpreter = Interpreter::bootstrap(&recipe).unwrap();

        assert_eq!(interpreter.global::<String>("ROOT").unwrap(), "/srv");
        assert_eq!(interpreter.global::<String>("_eventfolder").unwrap(), "/evt");
        assert_eq!(interpreter.global::<String>("MODE").unwrap(), "debug");
        assert_eq!(interpreter.global::<i64>("SELF").unwrap(), interpreter.id() as i64);
    }

    #[test]
    fn test_dispatch_identity() {
        let recipe = recipe("fn doPost(req) { req }");
        let mut interpreter = Interpreter::bootstrap(&recipe).unwrap();
        assert_eq!(interpreter.dispatch("{\"op\":\"ping\"}").unwrap(), "{\"op\":\"ping\"}");
    }

    #[test]
    fn test_missing_entry_point() {
        let recipe = recipe("fn other(req) { req }");
        let mut interpreter = Interpreter::bootstrap(&recipe).unwrap();
        let err = interpreter.dispatch("x").unwrap_err();
        assert!(matches!(err, ScriptError::EntryPointMissing { ref name } if name == "doPost"));
    }

    #[test]
    fn test_entry_arity_mismatch_is_missing() {
        let recipe = recipe("fn doPost() { \"no params\" }");
        let mut interpreter = Interpreter::bootstrap(&recipe).unwrap();
        assert!(matches!(
            interpreter.dispatch("x"),
            Err(ScriptError::EntryPointMissing { .. })
        ));
    }

    #[test]
    fn test_bad_recursive_entry_call_is_dispatch_error() {
        let recipe = recipe(
            r#"
            fn doPost(req) {
                if req == "again" { doPost(req, "extra") } else { req }
            }
            "#,
        );
        let mut interpreter = Interpreter::bootstrap(&recipe).unwrap();
        let err = interpreter.dispatch("again").unwrap_err();
        assert!(matches!(err, ScriptError::Dispatch { .. }));
        assert!(err.invalidates_instance());
    }

    #[test]
    fn test_missing_helper_is_dispatch_error() {
        let recipe = recipe("fn doPost(req) { helper(req) }");
        let mut interpreter = Interpreter::bootstrap(&recipe).unwrap();
        assert!(matches!(
            interpreter.dispatch("x"),
            Err(ScriptError::Dispatch { .. })
        ));
    }

    #[test]
    fn test_non_string_result() {
        let recipe = recipe("fn doPost(req) { 42 }");
        let mut interpreter = Interpreter::bootstrap(&recipe).unwrap();
        let err = interpreter.dispatch("x").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidOutput { .. }));
        assert!(!err.to_string().contains("got string"));
    }

    #[test]
    fn test_thrown_error() {
        let recipe = recipe(r#"fn doPost(req) { throw "boom: " + req; }"#);
        let mut interpreter = Interpreter::bootstrap(&recipe).unwrap();
        let err = interpreter.dispatch("bad input").unwrap_err();
        assert!(err.to_string().contains("boom: bad input"));
    }

    #[test]
    fn test_deadline() {
        let source = MemoryScriptSource::new().with_file(
            "/srv/efw.server.rhai",
            "fn doPost(req) { let n = 0; loop { n += 1; } }",
        );
        let mut config = BridgeConfig::new("/srv", "/evt", false);
        config.dispatch_timeout = Some(Duration::from_millis(50));
        let recipe = Recipe::new(config, Arc::new(source));

        let mut interpreter = Interpreter::bootstrap(&recipe).unwrap();
        let err = interpreter.dispatch("x").unwrap_err();
        assert!(matches!(err, ScriptError::Timeout { timeout_ms: 50 }));
        assert!(DEADLINE.with(Cell::get).is_none());
    }

    #[test]
    fn test_bootstrap_compile_error() {
        let recipe = recipe("fn doPost(req) { req ");
        let err = Interpreter::bootstrap(&recipe).unwrap_err();
        match err {
            ScriptError::Init { source } => {
                assert!(matches!(*source, ScriptError::Compilation { .. }))
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_import_from_server_root() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("util.rhai"), r#"fn greet(n) { "hi " + n }"#).unwrap();
        std::fs::write(
            temp.path().join("efw.server.rhai"),
            r#"import "util" as util; const GREETING = util::greet("efw");"#,
        )
        .unwrap();

        let recipe = Recipe::new(
            BridgeConfig::new(temp.path(), temp.path(), false),
            Arc::new(crate::loader::FsScriptSource),
        );
        let interpreter = Interpreter::bootstrap(&recipe).unwrap();
        assert_eq!(interpreter.global::<String>("GREETING").unwrap(), "hi efw");
    }

    #[test]
    fn test_redefinition_replaces_function() {
        let source = MemoryScriptSource::new()
            .with_file("/srv/efw.server.rhai", r#"fn doPost(req) { "v1" }"#)
            .with_file("/srv/patch.rhai", r#"fn doPost(req) { "v2" }"#);
        let recipe = Recipe::new(BridgeConfig::new("/srv", "/evt", false), Arc::new(source));

        let mut interpreter = Interpreter::bootstrap(&recipe).unwrap();
        interpreter
            .load_script(&recipe.loader, Path::new("patch.rhai"))
            .unwrap();
        assert_eq!(interpreter.dispatch("x").unwrap(), "v2");
    }
}
