//! Cache invalidation adapters

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::ports::CacheInvalidator;

/// Clears a cache kept as files inside a directory.
///
/// Every entry inside the directory is removed; the directory itself stays.
/// Failures are logged and otherwise ignored.
pub struct DirectoryCache {
    dir: PathBuf,
}

impl DirectoryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CacheInvalidator for DirectoryCache {
    fn clear_all(&self) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            // Nothing cached yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!("failed to read cache directory {}: {}", self.dir.display(), e);
                return;
            }
        };

        let mut removed = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("failed to remove cache entry {}: {}", path.display(), e),
            }
        }
        debug!("cleared {} cache entries in {}", removed, self.dir.display());
    }
}

/// No cache to clear
pub struct NoopCache;

impl CacheInvalidator for NoopCache {
    fn clear_all(&self) {}
}
