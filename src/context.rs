//! Process-lifetime list of context files
//!
//! Paths are stored in absolute form in insertion order. The list only
//! grows until it is cleared and is never persisted beyond the snapshot a
//! session records at creation time.

use crate::error::{Result, StickllmError};
use std::path::{Path, PathBuf};

/// Ordered, append-only set of context file paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextFiles {
    files: Vec<String>,
}

impl ContextFiles {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `path` if it exists right now
    ///
    /// Relative paths are resolved against the current directory. Adding a
    /// path that is already present leaves the list unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StickllmError::UserInput`] if the file does not exist
    ///
    /// # Returns
    ///
    /// The absolute path that was recorded
    pub fn add(&mut self, path: &str) -> Result<String> {
        let candidate = Path::new(path);
        if !candidate.exists() {
            return Err(StickllmError::UserInput(format!("File not found: {}", path)).into());
        }

        let absolute = absolute_path(candidate)?;
        let absolute = absolute.to_string_lossy().to_string();
        if !self.files.contains(&absolute) {
            tracing::debug!("Context file added: {}", absolute);
            self.files.push(absolute.clone());
        }
        Ok(absolute)
    }

    /// Remove every path
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// The recorded paths in insertion order
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Number of recorded paths
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when no path is recorded
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
