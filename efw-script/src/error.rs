//! Error types for the interpreter bridge.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors that can occur while bootstrapping, loading or dispatching.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Bootstrapping an interpreter failed.
    #[error("Script initialization failed: {source}")]
    Init {
        /// The load failure behind it.
        #[source]
        source: Box<ScriptError>,
    },

    /// Script file not found.
    #[error("Script not found: {path}")]
    ScriptNotFound { path: PathBuf },

    /// Script file could not be read.
    #[error("Failed to read script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Script compilation error.
    #[error("Script compilation error in {path}: {message}")]
    Compilation { path: PathBuf, message: String },

    /// Error raised while evaluating a script's top-level code.
    #[error("Script runtime error in {path}: {message}")]
    Runtime { path: PathBuf, message: String },

    /// The entry function is not defined.
    #[error("Entry function {name} is not defined")]
    EntryPointMissing { name: String },

    /// The entry function raised an error.
    #[error("Dispatch failed: {message}")]
    Dispatch { message: String },

    /// Dispatch exceeded its deadline.
    #[error("Script execution timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Script exceeded operation limit.
    #[error("Script exceeded maximum operations ({max_ops})")]
    OperationLimit { max_ops: u64 },

    /// The entry function returned something other than a string.
    #[error("Invalid script output: expected {expected}, got {actual}")]
    InvalidOutput { expected: String, actual: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ScriptError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ScriptError::Config {
            message: message.into(),
        }
    }

    /// Create a compilation error.
    pub fn compilation(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ScriptError::Compilation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a runtime error.
    pub fn runtime(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ScriptError::Runtime {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap a load failure as an initialization failure.
    pub fn init(source: ScriptError) -> Self {
        ScriptError::Init {
            source: Box::new(source),
        }
    }

    /// Whether this is a failure to read or evaluate a script file.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            ScriptError::ScriptNotFound { .. }
                | ScriptError::Read { .. }
                | ScriptError::Compilation { .. }
                | ScriptError::Runtime { .. }
        )
    }

    /// Whether the interpreter that produced this error must be discarded
    /// before serving another request.
    pub fn invalidates_instance(&self) -> bool {
        matches!(
            self,
            ScriptError::Dispatch { .. }
                | ScriptError::Timeout { .. }
                | ScriptError::OperationLimit { .. }
                | ScriptError::InvalidOutput { .. }
        )
    }
}
