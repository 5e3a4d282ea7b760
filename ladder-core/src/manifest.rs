//! Upgrade manifest - the registered chain, as data
//!
//! The chain is described by `manifest.json` inside the scripts directory:
//! ```json
//! {
//!   "supportedVersions": ["2.5.12"],
//!   "steps": [
//!     { "accepts": ["2.5.1", "2.5.2"], "target": "2.5.3", "transactional": true },
//!     { "accepts": ["2.5.10", "2.5.11"], "target": "2.5.12", "script": "custom/up.sql" }
//!   ]
//! }
//! ```
//! Steps keep manifest order. A step without `script` runs
//! `<target>/upgrade.sql`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::adapters::script::{default_script_path, SqlScriptAction};
use crate::domain::result::{Error, Result};
use crate::domain::{Migration, SchemaVersion, SupportedVersionSet, VersionSet};

/// File name of the manifest inside the scripts directory
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFile {
    supported_versions: Vec<String>,
    #[serde(default)]
    steps: Vec<StepEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepEntry {
    accepts: Vec<String>,
    target: String,
    #[serde(default)]
    script: Option<PathBuf>,
    #[serde(default)]
    transactional: bool,
}

/// A step as declared in the manifest
#[derive(Debug, Clone)]
pub struct ManifestStep {
    pub accepts: VersionSet,
    pub target: SchemaVersion,
    pub script: PathBuf,
    pub transactional: bool,
}

impl ManifestStep {
    pub fn action(&self) -> SqlScriptAction {
        SqlScriptAction::new(&self.script).transactional(self.transactional)
    }

    pub fn to_migration(&self) -> Migration {
        Migration::new(self.accepts.iter().cloned(), self.target.clone(), self.action())
    }
}

/// Supported versions plus the registered steps
#[derive(Debug, Clone)]
pub struct Manifest {
    pub supported: SupportedVersionSet,
    pub steps: Vec<ManifestStep>,
}

impl Manifest {
    /// Load `manifest.json` from the scripts directory
    pub fn load(scripts_dir: &Path) -> Result<Self> {
        let path = scripts_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::config(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: ManifestFile = serde_json::from_str(content)?;

        let mut supported = SupportedVersionSet::new();
        for version in &raw.supported_versions {
            supported.insert(SchemaVersion::parse(version)?);
        }
        if supported.is_empty() {
            return Err(Error::config("manifest lists no supported versions"));
        }

        let steps = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Self::parse_step(index, entry))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { supported, steps })
    }

    fn parse_step(index: usize, entry: StepEntry) -> Result<ManifestStep> {
        let target = SchemaVersion::parse(&entry.target)
            .map_err(|e| Error::config(format!("step {}: {}", index + 1, e)))?;

        let mut accepts = VersionSet::new();
        for version in &entry.accepts {
            let version = SchemaVersion::parse(version)
                .map_err(|e| Error::config(format!("step {}: {}", index + 1, e)))?;
            accepts.insert(version);
        }
        if accepts.is_empty() {
            return Err(Error::config(format!(
                "step {} (target {}) accepts no versions",
                index + 1,
                target
            )));
        }

        let script = entry
            .script
            .unwrap_or_else(|| default_script_path(&target));

        Ok(ManifestStep {
            accepts,
            target,
            script,
            transactional: entry.transactional,
        })
    }

    /// The registered chain, in manifest order
    pub fn migrations(&self) -> Vec<Migration> {
        self.steps.iter().map(ManifestStep::to_migration).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const AIRTIME_LIKE: &str = r#"{
        "supportedVersions": ["2.5.12"],
        "steps": [
            { "accepts": ["2.5.1", "2.5.2"], "target": "2.5.3", "transactional": true },
            { "accepts": ["2.5.3"], "target": "2.5.4" },
            {
                "accepts": ["2.5.10", "2.5.11"],
                "target": "2.5.12",
                "script": "airtime_2.5.12/upgrade.sql"
            }
        ]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_json(AIRTIME_LIKE).unwrap();

        assert!(manifest.supported.contains(&SchemaVersion::new("2.5.12")));
        assert_eq!(manifest.steps.len(), 3);

        let first = &manifest.steps[0];
        assert_eq!(first.accepts.len(), 2);
        assert!(first.transactional);
        assert_eq!(first.script, Path::new("2.5.3").join("upgrade.sql"));

        assert!(!manifest.steps[1].transactional);
        assert_eq!(manifest.steps[2].script, PathBuf::from("airtime_2.5.12/upgrade.sql"));
    }

    #[test]
    fn test_migrations_keep_manifest_order() {
        let manifest = Manifest::from_json(AIRTIME_LIKE).unwrap();
        let targets: Vec<String> = manifest
            .migrations()
            .iter()
            .map(|m| m.target_version().to_string())
            .collect();
        assert_eq!(targets, vec!["2.5.3", "2.5.4", "2.5.12"]);
    }

    #[test]
    fn test_rejects_empty_supported_set() {
        let err = Manifest::from_json(r#"{ "supportedVersions": [] }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_step_without_accepted_versions() {
        let err = Manifest::from_json(
            r#"{ "supportedVersions": ["2"], "steps": [{ "accepts": [], "target": "2" }] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("accepts no versions"));
    }

    #[test]
    fn test_rejects_blank_versions() {
        let err = Manifest::from_json(
            r#"{ "supportedVersions": ["2"], "steps": [{ "accepts": ["1"], "target": " " }] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("step 1"));
    }

    #[test]
    fn test_load_missing_manifest() {
        let dir = tempdir().unwrap();
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
