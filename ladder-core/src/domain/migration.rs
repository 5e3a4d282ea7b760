//! Migration descriptor
//!
//! A migration is plain data: the versions it accepts, the version it
//! produces, and the action that performs the change. Concrete steps are
//! registered as a list of these records rather than one type per version.

use std::fmt;
use std::sync::Arc;

use super::version::{SchemaVersion, VersionSet};
use crate::ports::{MigrationAction, MigrationContext};

/// One step of the upgrade chain
#[derive(Clone)]
pub struct Migration {
    accepted: VersionSet,
    target: SchemaVersion,
    action: Arc<dyn MigrationAction>,
}

impl Migration {
    pub fn new<I, A>(accepted: I, target: impl Into<SchemaVersion>, action: A) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SchemaVersion>,
        A: MigrationAction + 'static,
    {
        Self {
            accepted: accepted.into_iter().collect(),
            target: target.into(),
            action: Arc::new(action),
        }
    }

    /// Whether this step may run when the database is at `version`
    pub fn accepts(&self, version: &SchemaVersion) -> bool {
        self.accepted.contains(version)
    }

    pub fn accepted_versions(&self) -> &VersionSet {
        &self.accepted
    }

    pub fn target_version(&self) -> &SchemaVersion {
        &self.target
    }

    pub fn action(&self) -> &dyn MigrationAction {
        self.action.as_ref()
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("accepted", &self.accepted)
            .field("target", &self.target)
            .field("action", &self.action.describe())
            .finish()
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}} -> {}", self.accepted, self.target)
    }
}

/// A migration body backed by a closure
pub struct FnAction<F> {
    label: String,
    f: F,
}

/// Wrap a data-fixup function as a [`MigrationAction`].
pub fn fn_action<F>(label: impl Into<String>, f: F) -> FnAction<F>
where
    F: Fn(&MigrationContext) -> anyhow::Result<()> + Send + Sync,
{
    FnAction {
        label: label.into(),
        f,
    }
}

impl<F> MigrationAction for FnAction<F>
where
    F: Fn(&MigrationContext) -> anyhow::Result<()> + Send + Sync,
{
    fn run(&self, ctx: &MigrationContext) -> anyhow::Result<()> {
        (self.f)(ctx)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> FnAction<impl Fn(&MigrationContext) -> anyhow::Result<()> + Send + Sync> {
        fn_action("noop", |_| Ok(()))
    }

    #[test]
    fn test_accepts_only_listed_versions() {
        let m = Migration::new(["2.5.10", "2.5.11"], "2.5.12", noop());
        assert!(m.accepts(&SchemaVersion::new("2.5.10")));
        assert!(m.accepts(&SchemaVersion::new("2.5.11")));
        assert!(!m.accepts(&SchemaVersion::new("2.5.12")));
        assert_eq!(m.target_version().as_str(), "2.5.12");
    }

    #[test]
    fn test_display_and_debug() {
        let m = Migration::new(["2.5.1", "2.5.2"], "2.5.3", noop());
        assert_eq!(m.to_string(), "{2.5.1, 2.5.2} -> 2.5.3");
        assert!(format!("{:?}", m).contains("noop"));
    }
}
