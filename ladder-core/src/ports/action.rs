//! Migration action port - the version-specific body of a migration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::result::Result;

/// Runs SQL against the database being upgraded
pub trait ScriptExecutor: Send + Sync {
    /// Execute a batch of statements. With `transactional`, either all of
    /// them take effect or none do.
    fn execute_script(&self, sql: &str, transactional: bool) -> Result<()>;
}

/// Everything a migration body may need while it runs
#[derive(Clone)]
pub struct MigrationContext {
    pub database: Arc<dyn ScriptExecutor>,
    pub scripts_dir: PathBuf,
}

impl MigrationContext {
    pub fn new(database: Arc<dyn ScriptExecutor>, scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            database,
            scripts_dir: scripts_dir.into(),
        }
    }

    /// Resolve a script path relative to the scripts directory
    pub fn script_path(&self, relative: &Path) -> PathBuf {
        self.scripts_dir.join(relative)
    }
}

/// The data or schema change performed by one migration step.
///
/// A step may be re-run after a crash between the action and the version
/// write, so actions must be idempotent.
pub trait MigrationAction: Send + Sync {
    fn run(&self, ctx: &MigrationContext) -> anyhow::Result<()>;

    /// Short human-readable label, used by plans and logs
    fn describe(&self) -> String {
        "custom action".to_string()
    }
}
