//! CLI command implementations

pub mod doctor;
pub mod history;
pub mod plan;
pub mod stamp;
pub mod status;
pub mod upgrade;

use std::path::PathBuf;

use anyhow::{Context, Result};
use ladder_core::LadderContext;

/// Get the ladder directory from environment or default
pub fn get_ladder_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LADDER_DIR") {
        Ok(PathBuf::from(dir))
    } else {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".ladder"))
    }
}

/// Get or create ladder context
pub fn get_context() -> Result<LadderContext> {
    let ladder_dir = get_ladder_dir()?;

    std::fs::create_dir_all(&ladder_dir)
        .with_context(|| format!("Failed to create ladder directory: {:?}", ladder_dir))?;

    LadderContext::new(&ladder_dir).context("Failed to initialize ladder context")
}
