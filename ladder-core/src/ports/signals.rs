//! Side-channel ports touched around every migration

use crate::domain::result::Result;

/// Clears any externally visible cache. Fire-and-forget.
pub trait CacheInvalidator: Send + Sync {
    fn clear_all(&self);
}

/// Tells the rest of the system that an upgrade is in progress.
///
/// Implementations may fail, but the runner never propagates those errors:
/// a failed toggle is logged and the upgrade continues.
pub trait MaintenanceSignal: Send + Sync {
    fn set_enabled(&self, enabled: bool) -> Result<()>;
}
