//! # efw-upload
//!
//! Upload handoff: multipart file parts are written to temp files and
//! registered per session under the name the client sent, for server
//! scripts to pick up later.
//!
//! ```rust,ignore
//! use efw_upload::{SessionFiles, UploadPart, UploadStaging};
//!
//! let files = Arc::new(SessionFiles::new());
//! let staging = UploadStaging::new(files.clone());
//!
//! let reply = staging.stage(&session_id, &parts)?; // "[]"
//! let path = files.take(&session_id, "report.csv");
//! ```

mod error;
mod part;
mod session;
mod staging;

pub use error::{Result, UploadError};
pub use part::{UploadPart, filename};
pub use session::SessionFiles;
pub use staging::{STAGED_RESPONSE, TEMP_PREFIX, TEMP_SUFFIX, UploadStaging};
