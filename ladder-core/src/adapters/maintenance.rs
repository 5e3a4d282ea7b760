//! Maintenance-mode adapters

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::result::Result;
use crate::ports::MaintenanceSignal;

/// Signals maintenance mode through a marker file.
///
/// While the file exists the host application is expected to turn user
/// traffic away.
pub struct MaintenanceFile {
    path: PathBuf,
}

impl MaintenanceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.path.exists()
    }
}

impl MaintenanceSignal for MaintenanceFile {
    fn set_enabled(&self, enabled: bool) -> Result<()> {
        if enabled {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.path, b"")?;
            info!("maintenance mode enabled ({})", self.path.display());
        } else if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("maintenance mode disabled");
        }
        Ok(())
    }
}

/// Maintenance signalling switched off
pub struct DisabledMaintenance;

impl MaintenanceSignal for DisabledMaintenance {
    fn set_enabled(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_toggle_creates_and_removes_marker() {
        let dir = tempdir().unwrap();
        let signal = MaintenanceFile::new(dir.path().join("run").join("maintenance.txt"));

        signal.set_enabled(true).unwrap();
        assert!(signal.is_enabled());

        signal.set_enabled(false).unwrap();
        assert!(!signal.is_enabled());

        // Disabling twice is fine
        signal.set_enabled(false).unwrap();
    }
}
