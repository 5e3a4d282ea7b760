//! Service layer - upgrade orchestration
//!
//! Services coordinate the domain, the ports and the adapters. Each service
//! focuses on one use case.

pub mod doctor;
pub mod history;
pub mod migration;
pub mod upgrade;

pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use history::{HistoryEntry, HistoryEvent, HistoryEventKind, HistoryService};
pub use migration::{
    plan, AppliedMigration, MigrationResult, MigrationRunner, PlannedStep, UpgradePlan,
};
pub use upgrade::{UpgradeOutcome, UpgradeService, UpgradeStatus};
