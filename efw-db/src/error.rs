//! Error types for the resource registry.

use thiserror::Error;

/// Boxed error produced by data-source collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when resolving, opening or closing connections.
#[derive(Error, Debug)]
pub enum DbError {
    /// Startup configuration is missing or inconsistent. Fatal.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The resource name is not configured or cannot be resolved.
    #[error("Resource not found: {name}")]
    ResourceNotFound {
        /// Name as requested, before qualification.
        name: String,
    },

    /// The data source refused or failed to produce a connection.
    #[error("Connection error for {name}: {source}")]
    Connection {
        /// Resource name.
        name: String,
        /// Error reported by the data source.
        #[source]
        source: BoxError,
    },

    /// Closing a connection failed.
    #[error("Close error for {name}: {source}")]
    Close {
        /// Resource name.
        name: String,
        /// Error reported by the connection.
        #[source]
        source: BoxError,
    },

    /// A request scope is already active on this thread.
    #[error("A request scope is already active on this thread")]
    ScopeActive,

    /// No request scope is active on this thread.
    #[error("No request scope is active on this thread")]
    NoActiveScope,

    /// The current request context is already borrowed further up the stack.
    #[error("The request context is already in use on this thread")]
    ScopeBusy,
}

/// Result type alias for registry operations.
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Create a resource-not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        DbError::ResourceNotFound { name: name.into() }
    }

    /// Create a connection error.
    pub fn connection(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DbError::Connection {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Whether the error is a per-request failure the caller may retry or
    /// report, as opposed to a startup failure.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DbError::Configuration(_))
    }
}
