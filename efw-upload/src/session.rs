//! Session-scoped table of staged files.

use dashmap::DashMap;
use efw_log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Staged uploads per session: file name to temp file path.
///
/// Safe to share between request threads.
#[derive(Debug, Default)]
pub struct SessionFiles {
    sessions: DashMap<String, HashMap<String, PathBuf>>,
}

impl SessionFiles {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` under `filename` for `session`.
    ///
    /// A file previously staged under the same name is deleted.
    pub fn keep(&self, session: &str, filename: impl Into<String>, path: impl Into<PathBuf>) {
        let filename = filename.into();
        let previous = self
            .sessions
            .entry(session.to_string())
            .or_default()
            .insert(filename.clone(), path.into());

        if let Some(previous) = previous {
            debug!("Replacing staged upload {} for session {}", filename, session);
            remove_file(&previous);
        }
    }

    /// Path staged under `filename`, if any.
    pub fn get(&self, session: &str, filename: &str) -> Option<PathBuf> {
        self.sessions
            .get(session)
            .and_then(|files| files.get(filename).cloned())
    }

    /// Remove the entry for `filename` and hand its path to the caller,
    /// who then owns the file.
    pub fn take(&self, session: &str, filename: &str) -> Option<PathBuf> {
        let mut files = self.sessions.get_mut(session)?;
        files.remove(filename)
    }

    /// File names staged for `session`, sorted.
    pub fn filenames(&self, session: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .sessions
            .get(session)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Forget `session` and delete its staged files. Returns how many
    /// entries it had.
    pub fn clear_session(&self, session: &str) -> usize {
        let Some((_, files)) = self.sessions.remove(session) else {
            return 0;
        };
        for path in files.values() {
            remove_file(path);
        }
        debug!("Cleared {} staged upload(s) for session {}", files.len(), session);
        files.len()
    }

    /// Number of sessions with staged files.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

fn remove_file(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to delete staged upload {}: {}", path.display(), e);
    }
}
