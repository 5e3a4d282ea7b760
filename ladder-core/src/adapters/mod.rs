//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the VersionStore port (and as the database scripts run against)
//! - A cache directory for the CacheInvalidator port
//! - A marker file for the MaintenanceSignal port
//! - SQL script files for the MigrationAction port

pub mod cache;
pub mod duckdb;
pub mod maintenance;
pub mod script;

pub use cache::{DirectoryCache, NoopCache};
pub use maintenance::{DisabledMaintenance, MaintenanceFile};
pub use script::SqlScriptAction;
