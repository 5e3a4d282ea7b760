//! Doctor service - manifest and database health checks

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::adapters::duckdb::DuckDbRepository;
use crate::adapters::script::validate_sql_syntax;
use crate::domain::result::Result;
use crate::manifest::Manifest;

/// Doctor service for health checks
pub struct DoctorService {
    repository: Arc<DuckDbRepository>,
    manifest: Manifest,
    scripts_dir: PathBuf,
}

fn check(
    ok: bool,
    fail_status: &str,
    pass: String,
    fail: String,
    details: Vec<serde_json::Value>,
) -> CheckResult {
    CheckResult {
        status: if ok { "pass" } else { fail_status }.to_string(),
        message: if ok { pass } else { fail },
        details: if details.is_empty() { None } else { Some(details) },
    }
}

impl DoctorService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        manifest: Manifest,
        scripts_dir: PathBuf,
    ) -> Self {
        Self {
            repository,
            manifest,
            scripts_dir,
        }
    }

    /// Run all health checks
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut checks = BTreeMap::new();

        // Script files present
        let mut missing = Vec::new();
        let mut unparsable = Vec::new();
        for step in &self.manifest.steps {
            let path = self.scripts_dir.join(&step.script);
            match std::fs::read_to_string(&path) {
                Ok(sql) => {
                    if let Err(e) = validate_sql_syntax(&sql) {
                        unparsable.push(json!({
                            "target": step.target,
                            "script": step.script.display().to_string(),
                            "error": e.to_string()
                        }));
                    }
                }
                Err(_) => missing.push(json!({
                    "target": step.target,
                    "script": path.display().to_string()
                })),
            }
        }
        checks.insert(
            "scripts_present".to_string(),
            check(
                missing.is_empty(),
                "error",
                format!("All {} upgrade script(s) found", self.manifest.steps.len()),
                format!("{} upgrade script(s) missing", missing.len()),
                missing,
            ),
        );
        checks.insert(
            "scripts_parse".to_string(),
            check(
                unparsable.is_empty(),
                "error",
                "All upgrade scripts parse".to_string(),
                format!("{} upgrade script(s) have syntax errors", unparsable.len()),
                unparsable,
            ),
        );

        // Targets that lead nowhere: not supported and accepted by no step
        let dead_ends: Vec<serde_json::Value> = self
            .manifest
            .steps
            .iter()
            .filter(|step| {
                !self.manifest.supported.contains(&step.target)
                    && !self
                        .manifest
                        .steps
                        .iter()
                        .any(|other| other.accepts.contains(&step.target))
            })
            .map(|step| json!({"target": step.target}))
            .collect();
        checks.insert(
            "dead_ends".to_string(),
            check(
                dead_ends.is_empty(),
                "warning",
                "Every step leads on to a supported version".to_string(),
                format!("{} step(s) end on a version no step accepts", dead_ends.len()),
                dead_ends,
            ),
        );

        // Recorded version
        let current = self.repository.read_version()?;
        let current_check = match current {
            None => CheckResult {
                status: "warning".to_string(),
                message: "No schema version recorded (run `ladder stamp`)".to_string(),
                details: None,
            },
            Some(version) if self.manifest.supported.contains(&version) => CheckResult {
                status: "pass".to_string(),
                message: format!("Schema version {} is supported", version),
                details: None,
            },
            Some(version) => {
                let accepted = self
                    .manifest
                    .steps
                    .iter()
                    .any(|s| s.accepts.contains(&version));
                check(
                    accepted,
                    "error",
                    format!("Schema version {} can be upgraded", version),
                    format!("No upgrade step accepts schema version {}", version),
                    vec![json!({"version": version, "supported": self.manifest.supported})],
                )
            }
        };
        checks.insert("current_version".to_string(), current_check);

        // Calculate summary
        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary { passed, warnings, errors },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}
