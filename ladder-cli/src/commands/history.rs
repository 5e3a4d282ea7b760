//! History command - view and manage the upgrade history

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::get_context;
use crate::output::{create_table, format_duration, format_timestamp};

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// Show recent history entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only failed steps
        #[arg(long)]
        failed: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear old history entries
    Clear {
        /// Delete entries older than N days
        #[arg(long, default_value = "90")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Epoch-millisecond cutoff for entries older than `days`
fn cutoff_ms(now_ms: i64, days: u64) -> Result<i64> {
    i64::try_from(days)
        .ok()
        .and_then(|days| days.checked_mul(DAY_MS))
        .and_then(|span| now_ms.checked_sub(span))
        .with_context(|| format!("--older-than-days {} is out of range", days))
}

pub fn run(command: HistoryCommands) -> Result<ExitCode> {
    let ctx = get_context()?;
    let service = ctx.upgrade_service.history();

    match command {
        HistoryCommands::List { limit, failed, json } => {
            let entries = if failed {
                service.get_failures(limit)?
            } else {
                service.get_recent(limit)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(ExitCode::SUCCESS);
            }

            if entries.is_empty() {
                println!("No history entries found.");
                return Ok(ExitCode::SUCCESS);
            }

            let mut table = create_table();
            table.set_header(vec!["Time", "Event", "From", "To", "Duration", "Error"]);

            for entry in &entries {
                let event = match entry.event.as_str() {
                    "failed" => entry.event.red().to_string(),
                    "applied" => entry.event.green().to_string(),
                    _ => entry.event.clone(),
                };
                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    event,
                    entry.from_version.clone().unwrap_or_default(),
                    entry.to_version.clone().unwrap_or_default(),
                    entry.duration_ms.map(format_duration).unwrap_or_default(),
                    if entry.error_message.is_some() {
                        "!".red().to_string()
                    } else {
                        String::new()
                    },
                ]);
            }

            println!("{}", table);

            // Show failure details if any
            if !failed {
                let failures: Vec<_> = entries
                    .iter()
                    .filter(|e| e.error_message.is_some())
                    .take(3)
                    .collect();
                if !failures.is_empty() {
                    println!();
                    println!("{}", "Recent Failures:".red().bold());
                    for entry in failures {
                        println!(
                            "  {} [{}]: {}",
                            format_timestamp(entry.timestamp).dimmed(),
                            entry.to_version.as_deref().unwrap_or("?"),
                            entry.error_message.as_deref().unwrap_or("Unknown error")
                        );
                    }
                }
            }
        }
        HistoryCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            let cutoff = cutoff_ms(chrono::Utc::now().timestamp_millis(), older_than_days)?;

            if !force && !json {
                if !Confirm::new()
                    .with_prompt(format!(
                        "Delete history entries older than {} days?",
                        older_than_days
                    ))
                    .default(false)
                    .interact()?
                {
                    println!("Cancelled.");
                    return Ok(ExitCode::SUCCESS);
                }
            }

            let deleted = service.delete_before(cutoff)?;

            if json {
                println!("{}", serde_json::json!({"deleted": deleted}));
            } else {
                println!("Deleted {} history entries", deleted);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW_MS: i64 = 1_700_000_000_000;

    #[test]
    fn test_cutoff_ms() {
        assert_eq!(cutoff_ms(NOW_MS, 0).unwrap(), NOW_MS);
        assert_eq!(cutoff_ms(NOW_MS, 90).unwrap(), NOW_MS - 90 * DAY_MS);
    }

    #[test]
    fn test_cutoff_ms_rejects_out_of_range_days() {
        assert!(cutoff_ms(NOW_MS, u64::MAX).is_err());
        assert!(cutoff_ms(NOW_MS, 106_751_991_168).is_err());
        assert!(cutoff_ms(NOW_MS, 106_751_991_167).is_ok());
    }

    #[test]
    fn test_cutoff_ms_never_moves_past_now() {
        // Far in the past, so nothing recent is deleted
        let cutoff = cutoff_ms(NOW_MS, 100_000_000).unwrap();
        assert!(cutoff < 0);
    }
}
