//! Migration runner - drives the upgrade chain to a fixpoint
//!
//! The runner scans the registered migrations in order and applies the first
//! one that accepts the current version. After every successful step it
//! starts over from the first migration, so registration order does not have
//! to match the order in which steps become applicable. A full pass without a
//! match ends the run.
//!
//! Cycles are not detected: a chain whose steps lead back to a version an
//! earlier step accepts will loop forever.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{Migration, SchemaVersion, SupportedVersionSet};
use crate::ports::{CacheInvalidator, MaintenanceSignal, MigrationContext, VersionStore};
use crate::services::history::{HistoryEvent, HistoryService};

/// One step the runner applied
#[derive(Debug, Clone, Serialize)]
pub struct AppliedMigration {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub duration_ms: i64,
}

/// Result of running the chain
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Steps applied, in order
    pub applied: Vec<AppliedMigration>,
    /// Version recorded when the run finished
    pub final_version: SchemaVersion,
}

impl MigrationResult {
    /// Whether at least one migration ran
    pub fn performed_any(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// A step the runner would take
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    /// Index of the migration in registration order
    pub position: usize,
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub action: String,
}

/// Dry-run of the chain from a starting version
#[derive(Debug, Clone, Serialize)]
pub struct UpgradePlan {
    pub start: SchemaVersion,
    pub steps: Vec<PlannedStep>,
    pub final_version: SchemaVersion,
}

/// Simulate the runner from `start` without touching anything.
///
/// Uses the same scan as [`MigrationRunner::run_all`], assuming every action
/// succeeds.
pub fn plan(migrations: &[Migration], start: &SchemaVersion) -> UpgradePlan {
    let mut current = start.clone();
    let mut steps = Vec::new();

    let mut i = 0;
    while i < migrations.len() {
        let migration = &migrations[i];
        if migration.accepts(&current) {
            steps.push(PlannedStep {
                position: i,
                from: current.clone(),
                to: migration.target_version().clone(),
                action: migration.action().describe(),
            });
            current = migration.target_version().clone();
            i = 0;
        } else {
            i += 1;
        }
    }

    UpgradePlan {
        start: start.clone(),
        steps,
        final_version: current,
    }
}

fn set_maintenance(signal: &dyn MaintenanceSignal, enabled: bool) {
    if let Err(e) = signal.set_enabled(enabled) {
        warn!("failed to set maintenance mode to {}: {}", enabled, e);
    }
}

/// Maintenance mode held for the lifetime of the guard.
///
/// Leaving happens on drop, so every exit path of a migration (including an
/// early return or a panic in the action) turns maintenance mode back off.
struct MaintenanceWindow<'a> {
    signal: &'a dyn MaintenanceSignal,
}

impl<'a> MaintenanceWindow<'a> {
    fn open(signal: &'a dyn MaintenanceSignal) -> Self {
        set_maintenance(signal, true);
        Self { signal }
    }
}

impl Drop for MaintenanceWindow<'_> {
    fn drop(&mut self) {
        set_maintenance(self.signal, false);
    }
}

/// Runs migrations against a version store
pub struct MigrationRunner<'a> {
    store: &'a dyn VersionStore,
    cache: &'a dyn CacheInvalidator,
    maintenance: &'a dyn MaintenanceSignal,
    supported: &'a SupportedVersionSet,
    history: Option<&'a HistoryService>,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(
        store: &'a dyn VersionStore,
        cache: &'a dyn CacheInvalidator,
        maintenance: &'a dyn MaintenanceSignal,
        supported: &'a SupportedVersionSet,
    ) -> Self {
        Self {
            store,
            cache,
            maintenance,
            supported,
            history: None,
        }
    }

    /// Record every applied and failed step
    pub fn with_history(mut self, history: &'a HistoryService) -> Self {
        self.history = Some(history);
        self
    }

    /// True iff the recorded version is not one the code supports
    pub fn needs_upgrade(&self) -> Result<bool> {
        let current = self.store.get_current_version()?;
        Ok(!self.supported.contains(&current))
    }

    /// Apply migrations until none accepts the current version.
    ///
    /// The first failure aborts the run and is returned as is. A chain that is
    /// stuck on an unsupported version is not an error here: the run simply
    /// applies nothing.
    pub fn run_all(
        &self,
        migrations: &[Migration],
        ctx: &MigrationContext,
    ) -> Result<MigrationResult> {
        let mut applied = Vec::new();

        let mut i = 0;
        while i < migrations.len() {
            let migration = &migrations[i];
            let current = self.store.get_current_version()?;
            if migration.accepts(&current) {
                applied.push(self.apply(migration, &current, ctx)?);
                // Start over, in case the migrations are not registered in order
                i = 0;
            } else {
                i += 1;
            }
        }

        let final_version = self.store.get_current_version()?;
        debug!(
            "migration run finished at {} after {} step(s)",
            final_version,
            applied.len()
        );

        Ok(MigrationResult {
            applied,
            final_version,
        })
    }

    fn apply(
        &self,
        migration: &Migration,
        from: &SchemaVersion,
        ctx: &MigrationContext,
    ) -> Result<AppliedMigration> {
        let target = migration.target_version();
        info!(
            "upgrading schema {} -> {} ({})",
            from,
            target,
            migration.action().describe()
        );
        let started = Instant::now();

        self.cache.clear_all();
        let window = MaintenanceWindow::open(self.maintenance);
        self.cache.clear_all();

        if let Err(source) = migration.action().run(ctx) {
            let err = Error::MigrationActionFailed {
                target: target.clone(),
                source,
            };
            drop(window);
            self.record(&HistoryEvent::failed(from, target).with_error(err.to_string()));
            return Err(err);
        }

        if let Err(e) = self.store.set_current_version(target) {
            let err = Error::PersistFailed {
                target: target.clone(),
                source: Box::new(e),
            };
            drop(window);
            self.record(&HistoryEvent::failed(from, target).with_error(err.to_string()));
            return Err(err);
        }

        self.cache.clear_all();
        drop(window);

        let duration_ms = started.elapsed().as_millis() as i64;
        self.record(&HistoryEvent::applied(from, target).with_duration(duration_ms));
        info!("schema upgraded to {} in {}ms", target, duration_ms);

        Ok(AppliedMigration {
            from: from.clone(),
            to: target.clone(),
            duration_ms,
        })
    }

    fn record(&self, event: &HistoryEvent) {
        if let Some(history) = self.history {
            history.record_best_effort(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::adapters::{DisabledMaintenance, NoopCache};
    use crate::domain::fn_action;

    /// Version store kept in memory
    struct MemoryStore {
        version: Mutex<SchemaVersion>,
        fail_writes: bool,
    }

    impl MemoryStore {
        fn at(version: &str) -> Self {
            Self {
                version: Mutex::new(SchemaVersion::new(version)),
                fail_writes: false,
            }
        }

        fn read_only(version: &str) -> Self {
            Self {
                fail_writes: true,
                ..Self::at(version)
            }
        }

        fn current(&self) -> String {
            self.version.lock().unwrap().to_string()
        }
    }

    impl VersionStore for MemoryStore {
        fn get_current_version(&self) -> Result<SchemaVersion> {
            Ok(self.version.lock().unwrap().clone())
        }

        fn set_current_version(&self, version: &SchemaVersion) -> Result<()> {
            if self.fail_writes {
                return Err(Error::database("disk full"));
            }
            *self.version.lock().unwrap() = version.clone();
            Ok(())
        }
    }

    /// Records cache clears and maintenance toggles in call order
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_maintenance: bool,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CacheInvalidator for Recorder {
        fn clear_all(&self) {
            self.calls.lock().unwrap().push("clear".to_string());
        }
    }

    impl MaintenanceSignal for Recorder {
        fn set_enabled(&self, enabled: bool) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("maintenance:{}", enabled));
            if self.fail_maintenance {
                return Err(Error::Other("read-only filesystem".to_string()));
            }
            Ok(())
        }
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn repository() -> Arc<DuckDbRepository> {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        Arc::new(repo)
    }

    fn context() -> MigrationContext {
        MigrationContext::new(repository(), ".")
    }

    /// A step that logs its name when it runs
    fn step(log: &Log, name: &str, accepts: &[&str], target: &str) -> Migration {
        let log = Arc::clone(log);
        let name = name.to_string();
        Migration::new(
            accepts.iter().copied(),
            target,
            fn_action(name.clone(), move |_| {
                log.lock().unwrap().push(name.clone());
                Ok(())
            }),
        )
    }

    fn failing_step(accepts: &[&str], target: &str) -> Migration {
        Migration::new(
            accepts.iter().copied(),
            target,
            fn_action("broken", |_| Err(anyhow::anyhow!("script exploded"))),
        )
    }

    fn supported(versions: &[&str]) -> SupportedVersionSet {
        versions.iter().copied().collect()
    }

    fn run(
        store: &MemoryStore,
        supported_set: &SupportedVersionSet,
        migrations: &[Migration],
    ) -> Result<MigrationResult> {
        MigrationRunner::new(store, &NoopCache, &DisabledMaintenance, supported_set)
            .run_all(migrations, &context())
    }

    #[test]
    fn test_needs_upgrade() {
        let supported_set = supported(&["2.5.12"]);

        let store = MemoryStore::at("2.5.12");
        let runner = MigrationRunner::new(&store, &NoopCache, &DisabledMaintenance, &supported_set);
        assert!(!runner.needs_upgrade().unwrap());

        let store = MemoryStore::at("2.5.11");
        let runner = MigrationRunner::new(&store, &NoopCache, &DisabledMaintenance, &supported_set);
        assert!(runner.needs_upgrade().unwrap());
    }

    #[test]
    fn test_restarts_scan_after_each_success() {
        let log = Log::default();
        // X is registered first but only becomes applicable after Y ran
        let migrations = vec![
            step(&log, "X", &["2"], "3"),
            step(&log, "Y", &["1"], "2"),
        ];
        let store = MemoryStore::at("1");

        let result = run(&store, &supported(&["3"]), &migrations).unwrap();

        assert_eq!(store.current(), "3");
        assert_eq!(result.applied.len(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["Y", "X"]);
        assert_eq!(result.final_version.as_str(), "3");
    }

    #[test]
    fn test_terminal_version_independent_of_registration_order() {
        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let chain = [(["1"], "2"), (["2"], "3"), (["3"], "4")];

        for order in orders {
            let log = Log::default();
            let migrations: Vec<Migration> = order
                .iter()
                .map(|&i| {
                    let (accepts, target) = chain[i];
                    step(&log, target, &accepts, target)
                })
                .collect();
            let store = MemoryStore::at("1");

            let result = run(&store, &supported(&["4"]), &migrations).unwrap();

            assert_eq!(store.current(), "4", "order {:?}", order);
            assert_eq!(result.applied.len(), 3, "order {:?}", order);
            assert_eq!(*log.lock().unwrap(), vec!["2", "3", "4"], "order {:?}", order);
        }
    }

    #[test]
    fn test_registration_order_decides_between_competing_steps() {
        let log = Log::default();
        let migrations = vec![
            step(&log, "C", &["1"], "2.5"),
            step(&log, "A", &["1"], "2"),
            step(&log, "B", &["2"], "3"),
        ];
        let store = MemoryStore::at("1");

        let result = run(&store, &supported(&["3"]), &migrations).unwrap();

        // C wins the first scan and nothing accepts 2.5
        assert_eq!(store.current(), "2.5");
        assert_eq!(result.applied.len(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["C"]);
    }

    #[test]
    fn test_stuck_version_applies_nothing() {
        let log = Log::default();
        let migrations = vec![
            step(&log, "A", &["1"], "2"),
            step(&log, "B", &["2"], "3"),
        ];
        let supported_set = supported(&["3"]);
        let store = MemoryStore::at("0.9");

        let runner = MigrationRunner::new(&store, &NoopCache, &DisabledMaintenance, &supported_set);
        assert!(runner.needs_upgrade().unwrap());

        let result = runner.run_all(&migrations, &context()).unwrap();
        assert!(!result.performed_any());
        assert_eq!(store.current(), "0.9");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_second_run_is_noop() {
        let log = Log::default();
        let migrations = vec![
            step(&log, "A", &["1"], "2"),
            step(&log, "B", &["2"], "3"),
        ];
        let store = MemoryStore::at("1");
        let supported_set = supported(&["3"]);

        assert!(run(&store, &supported_set, &migrations).unwrap().performed_any());
        let second = run(&store, &supported_set, &migrations).unwrap();

        assert!(!second.performed_any());
        assert_eq!(store.current(), "3");
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_chain_is_noop() {
        let store = MemoryStore::at("1");
        let result = run(&store, &supported(&["1"]), &[]).unwrap();
        assert!(!result.performed_any());
        assert_eq!(result.final_version.as_str(), "1");
    }

    #[test]
    fn test_failed_action_keeps_precondition_version() {
        let log = Log::default();
        let migrations = vec![
            step(&log, "A", &["1"], "2"),
            failing_step(&["2"], "3"),
            step(&log, "C", &["3"], "4"),
        ];
        let store = MemoryStore::at("1");

        let err = run(&store, &supported(&["4"]), &migrations).unwrap_err();

        match err {
            Error::MigrationActionFailed { target, source } => {
                assert_eq!(target.as_str(), "3");
                assert!(source.to_string().contains("script exploded"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.current(), "2");
        assert_eq!(*log.lock().unwrap(), vec!["A"]);
    }

    #[test]
    fn test_persist_failure_is_reported() {
        let log = Log::default();
        let migrations = vec![step(&log, "A", &["1"], "2")];
        let store = MemoryStore::read_only("1");

        let err = run(&store, &supported(&["2"]), &migrations).unwrap_err();

        assert!(matches!(err, Error::PersistFailed { ref target, .. } if target.as_str() == "2"));
        // The action ran even though the version did not move
        assert_eq!(*log.lock().unwrap(), vec!["A"]);
        assert_eq!(store.current(), "1");
    }

    #[test]
    fn test_apply_protocol_order() {
        let log = Log::default();
        let migrations = vec![step(&log, "A", &["1"], "2")];
        let store = MemoryStore::at("1");
        let supported_set = supported(&["2"]);
        let recorder = Recorder::default();

        MigrationRunner::new(&store, &recorder, &recorder, &supported_set)
            .run_all(&migrations, &context())
            .unwrap();

        assert_eq!(
            recorder.calls(),
            vec![
                "clear",
                "maintenance:true",
                "clear",
                "clear",
                "maintenance:false"
            ]
        );
    }

    #[test]
    fn test_failure_leaves_maintenance_mode() {
        let migrations = vec![failing_step(&["1"], "2")];
        let store = MemoryStore::at("1");
        let supported_set = supported(&["2"]);
        let recorder = Recorder::default();

        let result = MigrationRunner::new(&store, &recorder, &recorder, &supported_set)
            .run_all(&migrations, &context());

        assert!(result.is_err());
        assert_eq!(
            recorder.calls(),
            vec!["clear", "maintenance:true", "clear", "maintenance:false"]
        );
    }

    #[test]
    fn test_maintenance_errors_are_swallowed() {
        let log = Log::default();
        let migrations = vec![step(&log, "A", &["1"], "2")];
        let store = MemoryStore::at("1");
        let supported_set = supported(&["2"]);
        let recorder = Recorder {
            fail_maintenance: true,
            ..Recorder::default()
        };

        let result = MigrationRunner::new(&store, &NoopCache, &recorder, &supported_set)
            .run_all(&migrations, &context())
            .unwrap();

        assert!(result.performed_any());
        assert_eq!(store.current(), "2");
    }

    #[test]
    fn test_history_records_applied_and_failed_steps() {
        let repo = repository();
        let ctx = MigrationContext::new(repo.clone(), ".");
        let history = HistoryService::new(repo);
        let log = Log::default();
        let migrations = vec![step(&log, "A", &["1"], "2"), failing_step(&["2"], "3")];
        let store = MemoryStore::at("1");
        let supported_set = supported(&["3"]);

        let result = MigrationRunner::new(&store, &NoopCache, &DisabledMaintenance, &supported_set)
            .with_history(&history)
            .run_all(&migrations, &ctx);
        assert!(result.is_err());

        let entries = history.get_recent(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, "failed");
        assert_eq!(entries[0].to_version.as_deref(), Some("3"));
        assert!(entries[0].error_message.as_deref().unwrap().contains("script exploded"));
        assert_eq!(entries[1].event, "applied");
        assert_eq!(entries[1].from_version.as_deref(), Some("1"));
    }

    #[test]
    fn test_plan_matches_run() {
        let log = Log::default();
        let migrations = vec![
            step(&log, "X", &["2"], "3"),
            step(&log, "Y", &["1"], "2"),
        ];

        let planned = plan(&migrations, &SchemaVersion::new("1"));
        assert!(log.lock().unwrap().is_empty());

        let positions: Vec<usize> = planned.steps.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![1, 0]);
        assert_eq!(planned.steps[0].action, "Y");
        assert_eq!(planned.final_version.as_str(), "3");

        let store = MemoryStore::at("1");
        let result = run(&store, &supported(&["3"]), &migrations).unwrap();
        assert_eq!(result.final_version, planned.final_version);
        assert_eq!(result.applied.len(), planned.steps.len());
    }

    #[test]
    fn test_plan_from_stuck_version_is_empty() {
        let log = Log::default();
        let migrations = vec![step(&log, "A", &["1"], "2")];
        let planned = plan(&migrations, &SchemaVersion::new("7"));
        assert!(planned.steps.is_empty());
        assert_eq!(planned.final_version.as_str(), "7");
    }
}
