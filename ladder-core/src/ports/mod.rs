//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for the collaborators an upgrade touches.
//! The runner depends only on these traits; adapters provide the concrete
//! DuckDB, filesystem and script implementations.

mod action;
mod signals;
mod version_store;

pub use action::{MigrationAction, MigrationContext, ScriptExecutor};
pub use signals::{CacheInvalidator, MaintenanceSignal};
pub use version_store::VersionStore;
