//! Configuration management
//!
//! Settings live in `settings.json` inside the ladder directory:
//! ```json
//! {
//!   "databaseFile": "ladder.duckdb",
//!   "scriptsDir": "upgrade_sql",
//!   "cacheDir": "cache",
//!   "maintenanceFile": "maintenance.txt"
//! }
//! ```
//! Relative paths are resolved against the ladder directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::result::Result;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    database_file: Option<PathBuf>,
    #[serde(default)]
    scripts_dir: Option<PathBuf>,
    #[serde(default)]
    cache_dir: Option<PathBuf>,
    #[serde(default)]
    maintenance_file: Option<PathBuf>,
    // Settings owned by the host application
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

const DEFAULT_DATABASE_FILE: &str = "ladder.duckdb";
const DEFAULT_SCRIPTS_DIR: &str = "upgrade_sql";

/// Ladder configuration, with every path resolved
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub scripts_dir: PathBuf,
    /// Cache cleared around every step; no cache when unset
    pub cache_dir: Option<PathBuf>,
    /// Marker file signalling maintenance mode; signalling off when unset
    pub maintenance_file: Option<PathBuf>,
}

impl Config {
    /// Defaults for a ladder directory
    pub fn with_defaults(ladder_dir: &Path) -> Self {
        Self::resolve(ladder_dir, SettingsFile::default())
    }

    /// Load config from the ladder directory
    ///
    /// The database and scripts locations can be overridden via:
    /// 1. Settings file
    /// 2. Environment variables LADDER_DATABASE and LADDER_SCRIPTS_DIR
    pub fn load(ladder_dir: &Path) -> Result<Self> {
        let settings_path = ladder_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("ignoring malformed {}: {}", settings_path.display(), e);
                SettingsFile::default()
            })
        } else {
            SettingsFile::default()
        };

        let mut config = Self::resolve(ladder_dir, raw);

        if let Some(path) = env_path("LADDER_DATABASE") {
            config.database_path = ladder_dir.join(path);
        }
        if let Some(path) = env_path("LADDER_SCRIPTS_DIR") {
            config.scripts_dir = ladder_dir.join(path);
        }

        Ok(config)
    }

    fn resolve(ladder_dir: &Path, raw: SettingsFile) -> Self {
        let database_file = raw
            .database_file
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE));
        let scripts_dir = raw
            .scripts_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPTS_DIR));

        // join() keeps absolute paths as they are
        Self {
            database_path: ladder_dir.join(database_file),
            scripts_dir: ladder_dir.join(scripts_dir),
            cache_dir: raw.cache_dir.map(|p| ladder_dir.join(p)),
            maintenance_file: raw.maintenance_file.map(|p| ladder_dir.join(p)),
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
