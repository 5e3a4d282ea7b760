//! Core domain types
//!
//! Versions, version sets and migration descriptors. These are plain data
//! structures with validation logic; the I/O lives behind the ports.

pub mod migration;
pub mod result;
mod version;

pub use migration::{fn_action, FnAction, Migration};
pub use version::{SchemaVersion, SupportedVersionSet, VersionSet};
