//! SQL script migration action

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;
use tracing::info;

use crate::domain::SchemaVersion;
use crate::ports::{MigrationAction, MigrationContext, ScriptExecutor};

/// Validate SQL syntax before execution to catch malformed scripts early.
/// A script that does not parse is rejected before any statement runs.
pub fn validate_sql_syntax(sql: &str) -> Result<()> {
    let dialect = DuckDbDialect {};
    Parser::parse_sql(&dialect, sql).map_err(|e| {
        let msg = e.to_string();
        let cleaned = msg.trim_start_matches("sql parser error: ");
        anyhow!("{}", cleaned)
    })?;
    Ok(())
}

/// Default script location for a step: `<target>/upgrade.sql`
pub fn default_script_path(target: &SchemaVersion) -> PathBuf {
    Path::new(target.as_str()).join("upgrade.sql")
}

/// Runs a SQL script file against the configured database
#[derive(Debug, Clone)]
pub struct SqlScriptAction {
    script: PathBuf,
    transactional: bool,
}

impl SqlScriptAction {
    /// `script` is resolved against the scripts directory at run time
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            transactional: false,
        }
    }

    /// Run the whole script inside one transaction
    pub fn transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    /// Read and syntax-check the script without executing it
    pub fn load(&self, ctx: &MigrationContext) -> Result<String> {
        let path = ctx.script_path(&self.script);
        let sql = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read upgrade script {}", path.display()))?;
        validate_sql_syntax(&sql)
            .with_context(|| format!("Upgrade script {} is not valid SQL", path.display()))?;
        Ok(sql)
    }
}

impl MigrationAction for SqlScriptAction {
    fn run(&self, ctx: &MigrationContext) -> Result<()> {
        let sql = self.load(ctx)?;
        info!(
            "executing {} (transactional: {})",
            self.script.display(),
            self.transactional
        );
        ctx.database
            .execute_script(&sql, self.transactional)
            .with_context(|| format!("Upgrade script {} failed", self.script.display()))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sql script {}", self.script.display())
    }
}
