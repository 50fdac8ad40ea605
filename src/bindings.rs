//! Registry functions exposed to server scripts.

use efw_db::{DbError, RequestScope, ResourceRegistry};
use efw_script::rhai::{Engine, EvalAltResult};
use std::sync::Arc;

/// Engine setup hook registering the `db_*` script functions against
/// `registry`.
///
/// The functions act on the request scope of the calling thread:
///
/// - `db_open()` / `db_open(name)`: open a connection, returning its id
/// - `db_is_open()` / `db_is_open(name)`: whether one is open
/// - `db_close_all()`: close every connection the request opened
///
/// Registry errors are raised as script exceptions.
pub fn register_db_api(registry: Arc<ResourceRegistry>) -> impl Fn(&mut Engine) + Send + Sync + 'static {
    move |engine: &mut Engine| {
        let r = registry.clone();
        engine.register_fn("db_open", move || open(&r, None));

        let r = registry.clone();
        engine.register_fn("db_open", move |name: &str| open(&r, Some(name)));

        let r = registry.clone();
        engine.register_fn("db_is_open", move || is_open(&r, None));

        let r = registry.clone();
        engine.register_fn("db_is_open", move |name: &str| is_open(&r, Some(name)));

        let r = registry.clone();
        engine.register_fn("db_close_all", move || close_all(&r));
    }
}

fn open(registry: &ResourceRegistry, name: Option<&str>) -> Result<i64, Box<EvalAltResult>> {
    RequestScope::with_current(|ctx| registry.open(ctx, name).map(|db| db.id() as i64))
        .and_then(|opened| opened)
        .map_err(script_error)
}

fn is_open(registry: &ResourceRegistry, name: Option<&str>) -> Result<bool, Box<EvalAltResult>> {
    RequestScope::with_current(|ctx| registry.get(ctx, name).is_some()).map_err(script_error)
}

fn close_all(registry: &ResourceRegistry) -> Result<(), Box<EvalAltResult>> {
    RequestScope::with_current(|ctx| registry.close_all(ctx))
        .and_then(|closed| closed)
        .map_err(script_error)
}

fn script_error(err: DbError) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::from(err.to_string()))
}
