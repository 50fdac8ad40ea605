//! Logging for the efw runtime.
//!
//! Every efw crate logs through the macros exported here. Records go to
//! stderr, one per line, and the environment decides what is written, so a
//! deployed process can be made verbose without a rebuild.
//!
//! ```rust
//! use efw_log::{debug, warn};
//!
//! debug!("opening resource {}", "jdbc/efw");
//! warn!("connection for {} replaced", "jdbc/efw");
//! ```
//!
//! # Environment
//!
//! | variable | values | default |
//! |---|---|---|
//! | `EFW_DEBUG` | `1`/`0` | `0` |
//! | `EFW_LOG_LEVEL` | `trace`, `debug`, `info`, `warn`, `error`, `off` | `info` |
//! | `EFW_LOG_FORMAT` | `json`, `pretty`, `compact` | `json` |
//! | `EFW_LOG_TIMESTAMPS` | `1`/`0` | `1` |
//! | `EFW_LOG_MODULE` | `1`/`0` | `1` |
//!
//! The environment is read by the first level check, so settings apply
//! from the very first record. [`set_level`] and [`set_debug`] override
//! them at runtime.

mod config;
mod level;
mod sink;

pub use config::{
    LogConfig, config, enabled, init, is_debug_enabled, set_debug, set_level, threshold,
};
pub use level::{Format, Level};
pub use sink::render;

#[doc(hidden)]
pub use sink::emit;

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if $crate::enabled(level) {
            $crate::emit(level, module_path!(), format_args!($($arg)+));
        }
    }};
}

/// Log at trace level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Trace, $($arg)+) };
}

/// Log at debug level.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Debug, $($arg)+) };
}

/// Log at info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Info, $($arg)+) };
}

/// Log at warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Warn, $($arg)+) };
}

/// Log at error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Error, $($arg)+) };
}

/// A `tracing` subscriber for the crates that log through `tracing`,
/// filtered by the same threshold.
#[cfg(feature = "tracing")]
pub mod subscriber {
    use crate::{Format, Level, config, threshold};
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    /// Build the subscriber. `RUST_LOG`, when set, replaces the threshold.
    pub fn build() -> impl tracing::Subscriber + Send + Sync {
        let directive = match threshold() {
            Level::Off => "off".to_string(),
            level => level.as_str().to_ascii_lowercase(),
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

        let config = config();
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(config.target);
        let layer = match config.format {
            Format::Json => layer.json().boxed(),
            Format::Compact => layer.compact().boxed(),
            Format::Pretty => layer.boxed(),
        };

        tracing_subscriber::registry().with(filter).with(layer)
    }

    /// Install [`build`] as the global default. Returns `false` when one
    /// was already installed.
    pub fn install() -> bool {
        tracing::subscriber::set_global_default(build()).is_ok()
    }
}
