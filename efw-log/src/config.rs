//! Environment configuration and the process-wide threshold.

use crate::level::{Format, Level};
use once_cell::sync::Lazy;
use std::env;
use std::sync::atomic::{AtomicU8, Ordering};

/// Threshold not yet taken from the environment.
const UNRESOLVED: u8 = u8::MAX;

static THRESHOLD: AtomicU8 = AtomicU8::new(UNRESOLVED);

static CONFIG: Lazy<LogConfig> = Lazy::new(|| LogConfig::from_vars(|name| env::var(name).ok()));

/// Logging settings read from `EFW_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EFW_DEBUG`: debug records are emitted whatever the level says.
    pub debug: bool,
    /// `EFW_LOG_LEVEL`, default `info`.
    pub level: Level,
    /// `EFW_LOG_FORMAT`, default `json`.
    pub format: Format,
    /// `EFW_LOG_TIMESTAMPS`, default on.
    pub timestamps: bool,
    /// `EFW_LOG_MODULE`: write the record target, default on.
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            timestamps: true,
            target: true,
        }
    }
}

impl LogConfig {
    /// Read the settings through `var`; unset or unparsable values keep
    /// their defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str, default: bool| {
            var(name)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };
        let defaults = Self::default();

        Self {
            debug: flag("EFW_DEBUG", defaults.debug),
            level: var("EFW_LOG_LEVEL")
                .and_then(|v| Level::parse(&v))
                .unwrap_or(defaults.level),
            format: var("EFW_LOG_FORMAT")
                .and_then(|v| Format::parse(&v))
                .unwrap_or(defaults.format),
            timestamps: flag("EFW_LOG_TIMESTAMPS", defaults.timestamps),
            target: flag("EFW_LOG_MODULE", defaults.target),
        }
    }

    /// Lowest level emitted under these settings.
    pub fn threshold(&self) -> Level {
        if self.debug {
            self.level.min(Level::Debug)
        } else {
            self.level
        }
    }
}

/// The settings read from the environment on first use.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

/// Lowest level currently emitted.
///
/// Until [`set_level`] is called this is the environment's threshold, read
/// on the first call.
pub fn threshold() -> Level {
    if let Some(level) = Level::from_u8(THRESHOLD.load(Ordering::Relaxed)) {
        return level;
    }

    let configured = config().threshold();
    match THRESHOLD.compare_exchange(UNRESOLVED, configured as u8, Ordering::AcqRel, Ordering::Relaxed) {
        Ok(_) => configured,
        Err(raced) => Level::from_u8(raced).unwrap_or(configured),
    }
}

/// Whether records at `level` are emitted.
#[inline]
pub fn enabled(level: Level) -> bool {
    level != Level::Off && level >= threshold()
}

/// Whether debug records are emitted.
pub fn is_debug_enabled() -> bool {
    enabled(Level::Debug)
}

/// Replace the threshold for the rest of the process.
pub fn set_level(level: Level) {
    THRESHOLD.store(level as u8, Ordering::Release);
}

/// Turn debug records on (lowering the threshold to `Debug` if needed) or
/// off (raising it to `Info` if needed).
pub fn set_debug(enabled: bool) {
    let current = threshold();
    set_level(if enabled {
        current.min(Level::Debug)
    } else {
        current.max(Level::Info)
    });
}

/// Read the environment now rather than on the first record.
pub fn init() {
    threshold();
}
