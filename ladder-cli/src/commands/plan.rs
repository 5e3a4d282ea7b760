//! Plan command - preview the steps an upgrade would apply

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use ladder_core::services::UpgradePlan;
use ladder_core::SupportedVersionSet;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<ExitCode> {
    let ctx = get_context()?;
    let plan = ctx.upgrade_service.plan()?;
    let supported = ctx.upgrade_service.supported_versions();

    if json {
        let ends_supported = supported.contains(&plan.final_version);
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "plan": plan,
                "endsSupported": ends_supported,
            }))?
        );
        return Ok(ExitCode::SUCCESS);
    }

    print_plan(&plan, supported);
    Ok(ExitCode::SUCCESS)
}

pub fn print_plan(plan: &UpgradePlan, supported: &SupportedVersionSet) {
    if plan.steps.is_empty() {
        if supported.contains(&plan.start) {
            output::success(&format!("Schema version {} is supported, nothing to do", plan.start));
        } else {
            output::warning(&format!(
                "No upgrade step accepts version {} (supported: {})",
                plan.start, supported
            ));
        }
        return;
    }

    let mut table = output::create_table();
    table.set_header(vec!["#", "From", "To", "Action"]);
    for step in &plan.steps {
        table.add_row(vec![
            step.position.to_string(),
            step.from.to_string(),
            step.to.to_string(),
            step.action.clone(),
        ]);
    }
    println!("{}", table);

    if supported.contains(&plan.final_version) {
        println!("Ends at {}", plan.final_version.to_string().green());
    } else {
        println!(
            "Ends at {}, which is not supported ({})",
            plan.final_version.to_string().red(),
            supported
        );
    }
}
