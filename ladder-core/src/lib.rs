//! Ladder Core - sequential, versioned schema upgrades
//!
//! This crate follows a hexagonal layout:
//!
//! - **domain**: Versions, version sets and migration descriptors
//! - **ports**: Traits for the collaborators an upgrade touches (VersionStore, ...)
//! - **services**: The migration runner, the upgrade entry point, history and checks
//! - **adapters**: Concrete implementations (DuckDB, cache directory, maintenance file,
//!   SQL scripts)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod manifest;
pub mod ports;
pub mod schema;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::duckdb::DuckDbRepository;
use adapters::{DirectoryCache, MaintenanceFile};
use config::Config;
use manifest::Manifest;
use services::{DoctorService, UpgradeOutcome, UpgradeService};

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult, Result};
pub use domain::{fn_action, Migration, SchemaVersion, SupportedVersionSet, VersionSet};
pub use ports::{
    CacheInvalidator, MaintenanceSignal, MigrationAction, MigrationContext, ScriptExecutor,
    VersionStore,
};

/// Main context for Ladder operations
///
/// Holds the configuration, the database connection and the services built
/// on top of them.
pub struct LadderContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub manifest: Manifest,
    pub upgrade_service: UpgradeService,
    pub doctor_service: DoctorService,
}

impl LadderContext {
    /// Create a new Ladder context from a ladder directory
    pub fn new(ladder_dir: &Path) -> Result<Self> {
        let config = Config::load(ladder_dir)?;

        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let repository = Arc::new(DuckDbRepository::new(&config.database_path)?);
        repository.ensure_schema()?;

        let manifest = Manifest::load(&config.scripts_dir)?;

        let mut upgrade_service = UpgradeService::new(
            Arc::clone(&repository),
            manifest.supported.clone(),
            manifest.migrations(),
            config.scripts_dir.clone(),
        );
        if let Some(dir) = &config.cache_dir {
            upgrade_service = upgrade_service.with_cache(DirectoryCache::new(dir));
        }
        if let Some(path) = &config.maintenance_file {
            upgrade_service = upgrade_service.with_maintenance(MaintenanceFile::new(path));
        }

        let doctor_service = DoctorService::new(
            Arc::clone(&repository),
            manifest.clone(),
            config.scripts_dir.clone(),
        );

        Ok(Self {
            config,
            repository,
            manifest,
            upgrade_service,
            doctor_service,
        })
    }

    /// Startup entry point: upgrade the database if its version is not supported
    pub fn check_if_upgrade_is_needed(&self) -> Result<UpgradeOutcome> {
        self.upgrade_service.check_if_upgrade_is_needed()
    }
}
