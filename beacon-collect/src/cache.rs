//! Bounded append-only disk cache.
//!
//! Mirrors buffered-but-unsent event text across process restarts. The cache
//! is a backpressure valve, not a data-loss point: an append that would cross
//! the size ceiling is skipped whole and the in-memory buffer keeps the data.

use crate::error::{CollectError, CollectResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed mirror of a collect buffer, capped at a configured size.
pub struct DiskCache {
    path: PathBuf,
    max_bytes: u64,
}

impl DiskCache {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            path: path.into(),
            max_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file size in bytes; zero when the file does not exist.
    pub fn size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Appends a chunk of fragment text, returning `false` when the write
    /// would cross the ceiling. Existing content is never truncated.
    pub fn append(&self, chunk: &str) -> CollectResult<bool> {
        if self.size() + chunk.len() as u64 > self.max_bytes {
            debug!(
                cache = %self.path.display(),
                "disk cache at capacity, append skipped"
            );
            return Ok(false);
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CollectError::Storage(e.to_string()))?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CollectError::Storage(e.to_string()))?;
        file.write_all(chunk.as_bytes())
            .map_err(|e| CollectError::Storage(e.to_string()))?;

        Ok(true)
    }

    /// Reads the whole cache and deletes the file (single-use recovery).
    pub fn take(&self) -> CollectResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| CollectError::Storage(e.to_string()))?;
        std::fs::remove_file(&self.path).map_err(|e| CollectError::Storage(e.to_string()))?;

        Ok(Some(contents))
    }

    /// Deletes the cache file if present.
    pub fn clear(&self) -> CollectResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| CollectError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}
