//! Writing uploaded parts to temp files.

use crate::error::{Result, UploadError};
use crate::part::UploadPart;
use crate::session::SessionFiles;
use efw_log::{debug, info};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Reply sent to the client after staging.
pub const STAGED_RESPONSE: &str = "[]";

/// Temp file name prefix.
pub const TEMP_PREFIX: &str = "efw";

/// Temp file name suffix.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Stages uploaded files and registers them in a [`SessionFiles`] table.
#[derive(Debug, Clone)]
pub struct UploadStaging {
    files: Arc<SessionFiles>,
    dir: Option<PathBuf>,
}

impl UploadStaging {
    /// Stage into the system temp directory.
    pub fn new(files: Arc<SessionFiles>) -> Self {
        Self { files, dir: None }
    }

    /// Stage into `dir` instead of the system temp directory.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// The session table staged files are registered in.
    pub fn files(&self) -> &Arc<SessionFiles> {
        &self.files
    }

    /// Write every file part to a fresh temp file and register it under
    /// its client-supplied name for `session`.
    ///
    /// Parts without a file name (plain form fields) are skipped. Fails
    /// before writing anything if a part has no `Content-Disposition`.
    /// Returns the reply body for the client.
    pub fn stage(&self, session: &str, parts: &[UploadPart]) -> Result<String> {
        let staged = self.stage_parts(session, parts)?;
        info!("Staged {} upload(s) for session {}", staged.len(), session);
        Ok(STAGED_RESPONSE.to_string())
    }

    /// Like [`stage`](Self::stage), returning the staged names and paths.
    pub fn stage_parts(&self, session: &str, parts: &[UploadPart]) -> Result<Vec<(String, PathBuf)>> {
        if let Some(index) = parts.iter().position(|p| p.content_disposition().is_none()) {
            return Err(UploadError::MissingContentDisposition { index });
        }

        let mut staged = Vec::new();
        for part in parts {
            let Some(filename) = part.filename() else {
                continue;
            };
            let path = self.write_temp(&filename, part)?;
            debug!("Staged {} ({} bytes) at {}", filename, part.size(), path.display());
            self.files.keep(session, filename.clone(), path.clone());
            staged.push((filename, path));
        }
        Ok(staged)
    }

    fn write_temp(&self, filename: &str, part: &UploadPart) -> Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX);

        let stage_err = |source| UploadError::Stage {
            filename: filename.to_string(),
            source,
        };
        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(stage_err)?;

        file.write_all(part.data()).map_err(stage_err)?;
        file.flush().map_err(stage_err)?;

        file.into_temp_path()
            .keep()
            .map_err(|e| UploadError::Persist {
                path: e.path.to_path_buf(),
                source: e.error,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_form_fields_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let staging = UploadStaging::new(Arc::new(SessionFiles::new())).with_dir(dir.path());

        let parts = vec![
            UploadPart::new(r#"form-data; name="comment""#, "hello"),
            UploadPart::new(r#"form-data; name="f"; filename="a.txt""#, "contents"),
        ];
        let staged = staging.stage_parts("s", &parts).unwrap();

        assert_eq!(staged.len(), 1);
        let (name, path) = &staged[0];
        assert_eq!(name, "a.txt");
        assert_eq!(fs::read_to_string(path).unwrap(), "contents");
    }

    #[test]
    fn test_temp_file_naming() {
        let dir = tempfile::tempdir().unwrap();
        let staging = UploadStaging::new(Arc::new(SessionFiles::new())).with_dir(dir.path());

        let parts = [UploadPart::new(r#"form-data; filename="b.bin""#, vec![0u8; 4])];
        let staged = staging.stage_parts("s", &parts).unwrap();
        let file_name = staged[0].1.file_name().unwrap().to_string_lossy().into_owned();

        assert!(file_name.starts_with(TEMP_PREFIX));
        assert!(file_name.ends_with(TEMP_SUFFIX));
        assert_eq!(staged[0].1.parent(), Some(dir.path()));
    }

    #[test]
    fn test_missing_disposition_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(SessionFiles::new());
        let staging = UploadStaging::new(files.clone()).with_dir(dir.path());

        let parts = vec![
            UploadPart::new(r#"form-data; filename="a.txt""#, "a"),
            UploadPart::without_disposition("b"),
        ];
        let err = staging.stage("s", &parts).unwrap_err();

        assert!(matches!(err, UploadError::MissingContentDisposition { index: 1 }));
        assert_eq!(files.session_count(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
