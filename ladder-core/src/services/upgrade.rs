//! Upgrade service - the startup entry point
//!
//! Host applications call [`UpgradeService::check_if_upgrade_is_needed`] once
//! before serving traffic. It compares the recorded version with the
//! supported set and, when they differ, runs the registered chain.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::adapters::duckdb::DuckDbRepository;
use crate::adapters::{DisabledMaintenance, NoopCache};
use crate::domain::result::{Error, Result};
use crate::domain::{Migration, SchemaVersion, SupportedVersionSet};
use crate::ports::{CacheInvalidator, MaintenanceSignal, MigrationContext, VersionStore};
use crate::services::history::{HistoryEvent, HistoryService};
use crate::services::migration::{plan, AppliedMigration, MigrationRunner, UpgradePlan};

/// What the entry point did
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeOutcome {
    pub start_version: SchemaVersion,
    pub final_version: SchemaVersion,
    pub applied: Vec<AppliedMigration>,
}

impl UpgradeOutcome {
    pub fn upgraded(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Where the database stands
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeStatus {
    /// `None` when no version has been recorded yet
    pub current_version: Option<SchemaVersion>,
    pub supported_versions: SupportedVersionSet,
    pub needs_upgrade: bool,
    pub registered_steps: usize,
    /// What a run would do from the current version
    pub plan: Option<UpgradePlan>,
}

/// Upgrade entry point and status queries
pub struct UpgradeService {
    repository: Arc<DuckDbRepository>,
    history: HistoryService,
    cache: Box<dyn CacheInvalidator>,
    maintenance: Box<dyn MaintenanceSignal>,
    supported: SupportedVersionSet,
    migrations: Vec<Migration>,
    scripts_dir: PathBuf,
}

impl UpgradeService {
    /// Cache and maintenance signalling default to no-ops
    pub fn new(
        repository: Arc<DuckDbRepository>,
        supported: SupportedVersionSet,
        migrations: Vec<Migration>,
        scripts_dir: PathBuf,
    ) -> Self {
        let history = HistoryService::new(Arc::clone(&repository));
        Self {
            repository,
            history,
            cache: Box::new(NoopCache),
            maintenance: Box::new(DisabledMaintenance),
            supported,
            migrations,
            scripts_dir,
        }
    }

    pub fn with_cache(mut self, cache: impl CacheInvalidator + 'static) -> Self {
        self.cache = Box::new(cache);
        self
    }

    pub fn with_maintenance(mut self, maintenance: impl MaintenanceSignal + 'static) -> Self {
        self.maintenance = Box::new(maintenance);
        self
    }

    pub fn supported_versions(&self) -> &SupportedVersionSet {
        &self.supported
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    fn runner(&self) -> MigrationRunner<'_> {
        MigrationRunner::new(
            &*self.repository,
            &*self.cache,
            &*self.maintenance,
            &self.supported,
        )
        .with_history(&self.history)
    }

    fn context(&self) -> MigrationContext {
        MigrationContext::new(self.repository.clone(), self.scripts_dir.clone())
    }

    pub fn needs_upgrade(&self) -> Result<bool> {
        self.runner().needs_upgrade()
    }

    /// Upgrade the database if its version is not supported.
    ///
    /// Fails with `UnsupportedCurrentVersion` when the chain ends (or starts)
    /// on a version the code does not support.
    pub fn check_if_upgrade_is_needed(&self) -> Result<UpgradeOutcome> {
        let runner = self.runner();
        let start_version = self.repository.get_current_version()?;

        if !runner.needs_upgrade()? {
            info!("schema version {} is supported, no upgrade needed", start_version);
            return Ok(UpgradeOutcome {
                final_version: start_version.clone(),
                start_version,
                applied: Vec::new(),
            });
        }

        info!(
            "schema version {} is not supported ({}), upgrading",
            start_version, self.supported
        );
        let result = runner.run_all(&self.migrations, &self.context())?;

        if !self.supported.contains(&result.final_version) {
            return Err(Error::UnsupportedCurrentVersion {
                version: result.final_version,
                supported: self.supported.clone(),
                start: start_version,
                applied: result.applied.len(),
            });
        }

        Ok(UpgradeOutcome {
            start_version,
            final_version: result.final_version,
            applied: result.applied,
        })
    }

    /// What a run would do from the recorded version
    pub fn plan(&self) -> Result<UpgradePlan> {
        let current = self.repository.get_current_version()?;
        Ok(plan(&self.migrations, &current))
    }

    pub fn status(&self) -> Result<UpgradeStatus> {
        let current_version = self.repository.read_version()?;
        let needs_upgrade = current_version
            .as_ref()
            .map_or(true, |v| !self.supported.contains(v));
        let plan = current_version
            .as_ref()
            .map(|v| plan(&self.migrations, v));

        Ok(UpgradeStatus {
            current_version,
            supported_versions: self.supported.clone(),
            needs_upgrade,
            registered_steps: self.migrations.len(),
            plan,
        })
    }

    /// Record `version` as current without running anything.
    ///
    /// Used to initialise a fresh database, or to move past a step whose
    /// action succeeded but whose version write did not.
    pub fn stamp(&self, version: &SchemaVersion) -> Result<()> {
        self.repository.set_current_version(version)?;
        self.history.record_best_effort(&HistoryEvent::stamped(version));
        info!("schema version stamped as {}", version);
        Ok(())
    }

    pub fn history(&self) -> &HistoryService {
        &self.history
    }
}
