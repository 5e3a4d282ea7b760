//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::version::{SchemaVersion, SupportedVersionSet};

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    /// The recorded version is not supported and no registered migration
    /// leads anywhere supported. `applied` counts the steps that ran from
    /// `start` before the chain stopped at `version`.
    #[error(
        "Unsupported schema version '{version}' (supported: {supported}); \
         no upgrade path available after {applied} step(s) from {start}"
    )]
    UnsupportedCurrentVersion {
        version: SchemaVersion,
        supported: SupportedVersionSet,
        start: SchemaVersion,
        applied: usize,
    },

    #[error("Upgrade to {target} failed: {source:#}")]
    MigrationActionFailed {
        target: SchemaVersion,
        #[source]
        source: anyhow::Error,
    },

    /// The action ran but the new version could not be recorded. The next run
    /// will execute the same action again.
    #[error("Upgrade to {target} was applied but the schema version could not be saved: {source}")]
    PersistFailed {
        target: SchemaVersion,
        #[source]
        source: Box<Error>,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Create a failed result with context
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                let mut context = HashMap::new();
                match &e {
                    Error::UnsupportedCurrentVersion {
                        version,
                        start,
                        applied,
                        ..
                    } => {
                        context.insert("version".to_string(), serde_json::json!(version));
                        context.insert("start".to_string(), serde_json::json!(start));
                        context.insert("applied".to_string(), serde_json::json!(applied));
                    }
                    Error::MigrationActionFailed { target, .. }
                    | Error::PersistFailed { target, .. } => {
                        context.insert("target".to_string(), serde_json::json!(target));
                    }
                    _ => {}
                }
                if context.is_empty() {
                    Self::fail(e.to_string())
                } else {
                    Self::fail_with_context(e.to_string(), context)
                }
            }
        }
    }
}
