//! Upload error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for upload operations.
pub type Result<T> = std::result::Result<T, UploadError>;

/// Upload staging errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A part carried no `Content-Disposition` header.
    #[error("Part {index} has no Content-Disposition header")]
    MissingContentDisposition {
        /// Position of the part in the request.
        index: usize,
    },

    /// Writing a staged file failed.
    #[error("Failed to stage {filename}: {source}")]
    Stage {
        /// Client-supplied file name.
        filename: String,
        #[source]
        source: std::io::Error,
    },

    /// Keeping a staged temp file failed.
    #[error("Failed to keep staged file {path}: {source}")]
    Persist {
        /// Temp file path.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Check if this is an I/O failure.
    pub fn is_io(&self) -> bool {
        !matches!(self, Self::MissingContentDisposition { .. })
    }
}
