//! Status command - show the recorded schema version

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;

pub fn run(json: bool) -> Result<ExitCode> {
    let ctx = get_context()?;
    let status = ctx.upgrade_service.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", "Schema Status".bold());
    println!();

    let current = status
        .current_version
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "(not recorded)".to_string());
    let upgrade = if status.needs_upgrade {
        "yes".yellow().to_string()
    } else {
        "no".green().to_string()
    };

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Database", &ctx.config.database_path.display().to_string()]);
    table.add_row(vec!["Current version", &current]);
    table.add_row(vec!["Supported versions", &status.supported_versions.to_string()]);
    table.add_row(vec!["Registered steps", &status.registered_steps.to_string()]);
    table.add_row(vec!["Upgrade needed", &upgrade]);
    println!("{}", table);

    if let Some(plan) = &status.plan {
        if status.needs_upgrade {
            println!();
            if plan.steps.is_empty() {
                println!(
                    "{}",
                    format!("No upgrade step accepts version {}", plan.start).red()
                );
            } else {
                println!(
                    "Run 'ladder upgrade' to apply {} step(s) ending at {}",
                    plan.steps.len(),
                    plan.final_version
                );
            }
        }
    } else {
        println!();
        println!(
            "{}",
            "No schema version recorded. Use 'ladder stamp <version>' to set one.".yellow()
        );
    }

    Ok(ExitCode::SUCCESS)
}
