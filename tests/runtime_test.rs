//! End-to-end tests: scripts opening registry connections inside requests.

use efw::efw_db::BoxError;
use efw::{
    BridgeConfig, Connection, DataSource, Dispatcher, EfwError, MemoryNamingService,
    ResourceRegistry, Runtime, ScriptError, Strategy,
};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

struct CountingConnection {
    counters: Arc<Counters>,
}

impl Connection for CountingConnection {
    fn close(&mut self) -> Result<(), BoxError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct CountingSource {
    counters: Arc<Counters>,
}

impl DataSource for CountingSource {
    fn connection(&self, _timeout: Duration) -> Result<Box<dyn Connection>, BoxError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingConnection {
            counters: self.counters.clone(),
        }))
    }
}

struct Fixture {
    _temp: TempDir,
    runtime: Runtime,
    counters: Arc<Counters>,
}

fn fixture(bootstrap: &str, strategy: Strategy) -> Fixture {
    let temp = TempDir::new().unwrap();
    let server = temp.path().join("scripts/server");
    let event = temp.path().join("scripts/event");
    fs::create_dir_all(&server).unwrap();
    fs::create_dir_all(&event).unwrap();
    fs::write(server.join("efw.server.rhai"), bootstrap).unwrap();

    let counters = Arc::new(Counters::default());
    let naming = MemoryNamingService::new();
    for name in ["java:comp/env/jdbc/efw", "java:comp/env/jdbc/report"] {
        naming.bind(
            name,
            Arc::new(CountingSource {
                counters: counters.clone(),
            }),
        );
    }

    let registry = ResourceRegistry::web(&HashMap::<String, String>::new(), Arc::new(naming)).unwrap();
    let mut config = BridgeConfig::new(server, event, false);
    config.strategy = strategy;
    let runtime = Runtime::initialize(Arc::new(registry), config).unwrap();

    Fixture {
        _temp: temp,
        runtime,
        counters,
    }
}

#[test]
fn test_script_connections_closed_after_request() {
    let f = fixture(
        r#"
        fn doPost(req) {
            db_open();
            db_open("jdbc/report");
            if !db_is_open() || !db_is_open("jdbc/report") { throw "not open"; }
            req
        }
        "#,
        Strategy::Shared,
    );

    assert_eq!(f.runtime.handle("{\"op\":\"ping\"}").unwrap(), "{\"op\":\"ping\"}");
    assert_eq!(f.counters.opened.load(Ordering::SeqCst), 2);
    assert_eq!(f.counters.closed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_close_all_from_script() {
    let f = fixture(
        r#"
        fn doPost(req) {
            db_open();
            db_close_all();
            db_close_all();
            if db_is_open() { "still open" } else { "closed" }
        }
        "#,
        Strategy::Shared,
    );

    assert_eq!(f.runtime.handle("x").unwrap(), "closed");
    assert_eq!(f.counters.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_requests_do_not_share_connections() {
    let f = fixture(
        r#"
        fn doPost(req) {
            if req == "open" { db_open(); }
            if db_is_open() { "open" } else { "none" }
        }
        "#,
        Strategy::Shared,
    );

    assert_eq!(f.runtime.handle("open").unwrap(), "open");
    assert_eq!(f.runtime.handle("check").unwrap(), "none");
}

#[test]
fn test_unknown_resource_fails_request_and_cleans_up() {
    let f = fixture(
        r#"
        fn doPost(req) {
            db_open();
            if req == "bad" { db_open("jdbc/missing"); }
            req
        }
        "#,
        Strategy::Shared,
    );

    let err = f.runtime.handle("bad").unwrap_err();
    assert!(matches!(err, EfwError::Script(ScriptError::Dispatch { .. })));
    assert!(err.to_string().contains("jdbc/missing"));
    assert!(err.is_request_error());
    assert_eq!(f.counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(f.counters.closed.load(Ordering::SeqCst), 1);

    // The next request is served normally.
    assert_eq!(f.runtime.handle("good").unwrap(), "good");
    assert_eq!(f.counters.closed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_db_functions_outside_request_scope() {
    let f = fixture("fn doPost(req) { db_open(); req }", Strategy::Shared);

    let err = f.runtime.bridge().dispatch("x").unwrap_err();
    assert!(matches!(err, ScriptError::Dispatch { .. }));
    assert_eq!(f.counters.opened.load(Ordering::SeqCst), 0);
}

fn concurrent_requests(strategy: Strategy) {
    let f = fixture(
        r#"
        fn doPost(req) {
            db_open();
            req
        }
        "#,
        strategy,
    );

    std::thread::scope(|s| {
        for worker in 0..8 {
            let runtime = &f.runtime;
            s.spawn(move || {
                for request in 0..10 {
                    let payload = format!("{worker}:{request}");
                    assert_eq!(runtime.handle(&payload).unwrap(), payload);
                }
            });
        }
    });

    assert_eq!(f.counters.opened.load(Ordering::SeqCst), 80);
    assert_eq!(f.counters.closed.load(Ordering::SeqCst), 80);
}

#[test]
fn test_concurrent_requests_shared() {
    concurrent_requests(Strategy::Shared);
}

#[test]
fn test_concurrent_requests_per_thread() {
    concurrent_requests(Strategy::PerThread);
}
