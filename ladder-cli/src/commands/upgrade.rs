//! Upgrade command - run the upgrade chain

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use ladder_core::OperationResult;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<ExitCode> {
    let ctx = get_context()?;
    let result = ctx.check_if_upgrade_is_needed();

    if json {
        let failed = result.is_err();
        let envelope: OperationResult<_> = result.into();
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS });
    }

    let outcome = result?;

    if !outcome.upgraded() {
        output::success(&format!(
            "Schema version {} is supported, no upgrade needed",
            outcome.final_version
        ));
        return Ok(ExitCode::SUCCESS);
    }

    for step in &outcome.applied {
        println!(
            "{} {} -> {} ({})",
            "Applied:".green(),
            step.from,
            step.to,
            output::format_duration(step.duration_ms)
        );
    }
    println!();
    output::success(&format!(
        "Upgraded from {} to {} in {} step(s)",
        outcome.start_version,
        outcome.final_version,
        outcome.applied.len()
    ));

    Ok(ExitCode::SUCCESS)
}
