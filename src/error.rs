//! Facade error type.

use thiserror::Error;

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, EfwError>;

/// Any error the efw crates can raise.
#[derive(Debug, Error)]
pub enum EfwError {
    /// Configuration loading failed.
    #[error(transparent)]
    Config(#[from] efw_config::ConfigError),

    /// Resource registry failure.
    #[error(transparent)]
    Db(#[from] efw_db::DbError),

    /// Interpreter bridge failure.
    #[error(transparent)]
    Script(#[from] efw_script::ScriptError),

    /// Upload staging failure.
    #[cfg(feature = "upload")]
    #[error(transparent)]
    Upload(#[from] efw_upload::UploadError),
}

impl EfwError {
    /// Whether the error only affects the current request.
    pub fn is_request_error(&self) -> bool {
        match self {
            EfwError::Db(e) => e.is_recoverable(),
            EfwError::Script(e) => !matches!(
                e,
                efw_script::ScriptError::Init { .. } | efw_script::ScriptError::Config { .. }
            ),
            EfwError::Config(_) => false,
            #[cfg(feature = "upload")]
            EfwError::Upload(_) => true,
        }
    }
}
