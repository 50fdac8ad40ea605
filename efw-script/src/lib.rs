//! # efw-script
//!
//! Server-side request logic written in Rhai.
//!
//! An [`InterpreterBridge`] bootstraps an interpreter from
//! `efw.server.rhai` under the server script root and hands each request
//! payload to the script's `doPost` function, returning the text it
//! produces.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use efw_script::{Dispatcher, InterpreterBridge, Strategy};
//!
//! let bridge = InterpreterBridge::builder("scripts/server", "scripts/event", false)
//!     .strategy(Strategy::PerThread)
//!     .dispatch_timeout(Duration::from_secs(30))
//!     .build()?;
//!
//! let reply = bridge.dispatch(r#"{"op":"ping"}"#)?;
//! ```
//!
//! ## Script Example
//!
//! ```rhai
//! // scripts/server/efw.server.rhai
//!
//! fn doPost(req) {
//!     let params = from_json(req);
//!     if is_debug() {
//!         print("serving " + params.op);
//!     }
//!     to_json(#{ op: params.op, ok: true })
//! }
//! ```
//!
//! ## Globals
//!
//! Every instance binds `_serverfolder`, `_eventfolder`, `_isdebug` and
//! `_engine` as constants before the bootstrap script runs. Functions
//! cannot see these, so `server_folder()`, `event_folder()` and
//! `is_debug()` return the same values. Modules under the server root can
//! be pulled in with `import`.
//!
//! ## Strategies
//!
//! - [`Strategy::Shared`]: one instance, dispatches serialized by a mutex.
//! - [`Strategy::PerThread`]: an instance per worker thread, each
//!   bootstrapped independently and dropped when the thread exits.

mod bindings;
mod bridge;
mod config;
mod error;
mod interpreter;
mod loader;

pub use bindings::EngineHandle;
pub use bridge::{Dispatcher, InterpreterBridge, InterpreterPool, SharedInterpreter};
pub use config::{
    BridgeBuilder, BridgeConfig, DEFAULT_BOOTSTRAP_FILE, DEFAULT_ENTRY_POINT, EngineSetup, Strategy,
};
pub use error::{Result, ScriptError};
pub use loader::{FsScriptSource, MemoryScriptSource, ScriptLoader, ScriptSource};

// Re-export rhai for host extensions
pub use rhai;

