//! Schema version tokens and version sets
//!
//! Versions are opaque: two versions are either the same token or they are
//! not. Nothing here orders them, so "2.5.10" is not considered newer than
//! "2.5.9". Migrations match by set membership only.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// A recorded schema version, e.g. `"2.5.11"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Parse a version coming from user input or a manifest.
    ///
    /// Surrounding whitespace is trimmed; an empty token is rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("schema version must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaVersion {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SchemaVersion {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A small set of versions that keeps declaration order for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionSet(Vec<SchemaVersion>);

/// Versions the current code can run against without migrating
pub type SupportedVersionSet = VersionSet;

impl VersionSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a version; duplicates are ignored.
    pub fn insert(&mut self, version: impl Into<SchemaVersion>) -> bool {
        let version = version.into();
        if self.contains(&version) {
            return false;
        }
        self.0.push(version);
        true
    }

    pub fn contains(&self, version: &SchemaVersion) -> bool {
        self.0.iter().any(|v| v == version)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaVersion> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<SchemaVersion>> FromIterator<S> for VersionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for version in iter {
            set.insert(version);
        }
        set
    }
}

impl fmt::Display for VersionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(SchemaVersion::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_rejects_empty() {
        assert_eq!(SchemaVersion::parse(" 2.5.3 ").unwrap().as_str(), "2.5.3");
        assert!(SchemaVersion::parse("   ").is_err());
        assert!(SchemaVersion::parse("").is_err());
    }

    #[test]
    fn test_membership_is_exact_token_match() {
        let set: VersionSet = ["2.5.10", "2.5.11"].into_iter().collect();
        assert!(set.contains(&SchemaVersion::new("2.5.10")));
        assert!(!set.contains(&SchemaVersion::new("2.5.1")));
        assert!(!set.contains(&SchemaVersion::new("2.5.100")));
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let mut set = VersionSet::new();
        assert!(set.insert("1"));
        assert!(!set.insert("1"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.to_string(), "1");
    }

    #[test]
    fn test_display_keeps_declaration_order() {
        let set = VersionSet::from_iter(["2.5.2", "2.5.1"]);
        assert_eq!(set.to_string(), "2.5.2, 2.5.1");
    }

    #[test]
    fn test_serializes_as_plain_strings() {
        let set = VersionSet::from_iter(["2.5.12"]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["2.5.12"]"#);
    }
}
