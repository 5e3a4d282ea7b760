//! Version store port - the persisted "current schema version"

use crate::domain::result::Result;
use crate::domain::SchemaVersion;

/// Reads and writes the single recorded schema version.
pub trait VersionStore: Send + Sync {
    /// The version the database is currently at.
    ///
    /// Returns `Error::NotFound` when no version has been recorded yet.
    fn get_current_version(&self) -> Result<SchemaVersion>;

    fn set_current_version(&self, version: &SchemaVersion) -> Result<()>;
}
