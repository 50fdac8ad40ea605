//! # efw
//!
//! Server-side runtime for script-driven web applications.
//!
//! Requests arrive as text payloads, are handed to the `doPost` function
//! of a Rhai script, and the script's text result goes back to the client.
//! While a request runs, scripts open named database connections through a
//! per-request registry; everything they open is closed when the request
//! ends.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use efw::{BridgeConfig, ConfigManager, MemoryNamingService, ResourceRegistry, Runtime};
//!
//! let config = ConfigManager::new();
//! config.load_file_auto("efw.properties")?;
//!
//! let naming = MemoryNamingService::new();
//! naming.bind("java:comp/env/jdbc/efw", data_source);
//!
//! let registry = Arc::new(ResourceRegistry::web(&config, Arc::new(naming))?);
//! let runtime = Runtime::initialize(
//!     registry,
//!     BridgeConfig::new("scripts/server", "scripts/event", false),
//! )?;
//!
//! let reply = runtime.handle(r#"{"eventId":"ping"}"#)?;
//! ```
//!
//! ## Crates
//!
//! - [`efw_log`]: environment-driven logging
//! - [`efw_config`]: properties/TOML/JSON/env configuration
//! - [`efw_db`]: resource registry and request scopes
//! - [`efw_script`]: the interpreter bridge
//! - `efw_upload`: upload staging (feature `upload`)

mod bindings;
mod error;
mod runtime;

pub use bindings::register_db_api;
pub use error::{EfwError, Result};
pub use runtime::Runtime;

// Re-export member crates
pub use efw_config;
pub use efw_db;
pub use efw_log;
pub use efw_script;

#[cfg(feature = "upload")]
pub use efw_upload;

pub use efw_config::{ConfigManager, PropertySource};
pub use efw_db::{
    Backend, Connection, DataSource, DbError, Driver, MemoryNamingService, NamingService,
    RequestScope, ResourceConfig, ResourceRegistry,
};
pub use efw_script::{BridgeConfig, Dispatcher, InterpreterBridge, ScriptError, Strategy};

#[cfg(feature = "upload")]
pub use efw_upload::{SessionFiles, UploadPart, UploadStaging};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        BridgeConfig, ConfigManager, Dispatcher, EfwError, PropertySource, RequestScope,
        ResourceRegistry, Runtime, Strategy,
    };
}
