//! Script source reading.

use crate::error::{Result, ScriptError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File-read service the bridge pulls script sources from.
///
/// Sources are text in a fixed encoding (UTF-8).
pub trait ScriptSource: Send + Sync {
    /// Read the full contents of `path`.
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// Reads scripts from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsScriptSource;

impl ScriptSource for FsScriptSource {
    fn read(&self, path: &Path) -> io::Result<String> {
        // Invalid UTF-8 surfaces as `InvalidData`.
        fs::read_to_string(path)
    }
}

/// In-memory script sources keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryScriptSource {
    files: Arc<RwLock<HashMap<PathBuf, String>>>,
}

impl MemoryScriptSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.write().insert(path.into(), contents.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }
}

impl ScriptSource for MemoryScriptSource {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

/// Resolves script paths against a base directory and reads them through
/// a [`ScriptSource`].
#[derive(Clone)]
pub struct ScriptLoader {
    base_dir: PathBuf,
    source: Arc<dyn ScriptSource>,
}

impl ScriptLoader {
    /// Create a loader rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, source: Arc<dyn ScriptSource>) -> Self {
        Self {
            base_dir: base_dir.into(),
            source,
        }
    }

    /// Resolve a script path relative to the base directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Read a script, resolving `path` first.
    pub fn load(&self, path: &Path) -> Result<(PathBuf, String)> {
        let full_path = self.resolve_path(path);

        match self.source.read(&full_path) {
            Ok(text) => Ok((full_path, text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ScriptError::ScriptNotFound { path: full_path })
            }
            Err(source) => Err(ScriptError::Read {
                path: full_path,
                source,
            }),
        }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl std::fmt::Debug for ScriptLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptLoader")
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}
