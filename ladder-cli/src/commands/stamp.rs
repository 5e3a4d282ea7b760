//! Stamp command - record a schema version without running a step

use std::process::ExitCode;

use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::Confirm;
use ladder_core::SchemaVersion;

use super::get_context;

pub fn run(version: &str, force: bool) -> Result<ExitCode> {
    let version = SchemaVersion::parse(version)?;
    let ctx = get_context()?;
    let current = ctx.repository.read_version()?;

    if current.as_ref() == Some(&version) {
        println!("{}", format!("Schema version is already {}", version).dimmed());
        return Ok(ExitCode::SUCCESS);
    }

    // Confirm unless --force
    if !force {
        if atty::isnt(atty::Stream::Stdin) {
            bail!("Refusing to stamp without confirmation; pass --force");
        }

        let from = current
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "(not recorded)".to_string());
        println!(
            "\n{}",
            format!("This will record schema version {} (currently {}).", version, from).yellow()
        );
        println!("{}\n", "No upgrade step will run.".dimmed());

        if !Confirm::new()
            .with_prompt("Are you sure?")
            .default(false)
            .interact()?
        {
            println!("{}\n", "Cancelled".dimmed());
            return Ok(ExitCode::SUCCESS);
        }
    }

    ctx.upgrade_service.stamp(&version)?;
    println!("{} Schema version set to {}", "✓".green(), version);

    if !ctx.upgrade_service.supported_versions().contains(&version) {
        println!(
            "{}",
            "This version is not supported; run 'ladder upgrade' next.".yellow()
        );
    }

    Ok(ExitCode::SUCCESS)
}
