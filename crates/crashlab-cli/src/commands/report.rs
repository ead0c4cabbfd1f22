//! Report command - Manage local crash reports
//!
//! Provides the `crashlab report` CLI command with subcommands:
//! - `list`: Show all saved reports
//! - `view <id>`: Display a specific report
//! - `delete`: Remove reports from local storage

use anyhow::{bail, Result};
use clap::Subcommand;

use crashlab_telemetry::{reports_dir, LocalReportStore};

use crate::app::AppContext;
use crate::output::{format_size, get_formatter, Table};

/// Report management subcommands
#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// List all saved crash reports
    List,
    /// View a specific report
    View {
        /// Report ID or filename fragment
        id: String,
        /// Show raw JSON instead of key/value lines
        #[arg(long)]
        raw: bool,
    },
    /// Delete reports from local storage
    Delete {
        /// Specific report ID to delete
        id: Option<String>,
        /// Delete all reports
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

impl ReportCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let formatter = get_formatter(app.format);
        let store = LocalReportStore::new(reports_dir(&app.config));

        match self {
            ReportCommand::List => {
                let entries = store.list()?;

                if app.format.is_json() {
                    formatter.print_json(&serde_json::to_value(&entries)?);
                    return Ok(());
                }
                if entries.is_empty() {
                    formatter.info("No reports found.");
                    return Ok(());
                }

                let mut table = Table::new(&[("ID", 12), ("TYPE", 8), ("DATE", 12), ("SIZE", 0)]);
                for entry in &entries {
                    table.row(vec![
                        entry.id.clone(),
                        entry.report_type.clone(),
                        entry.date.clone(),
                        format_size(entry.size_bytes),
                    ]);
                }
                table.print("report");
            }

            ReportCommand::View { id, raw } => {
                let Some(value) = store.read(id)? else {
                    bail!("Report '{id}' not found");
                };

                if *raw || app.format.is_json() {
                    println!("{}", serde_json::to_string_pretty(&value)?);
                } else if let Some(obj) = value.as_object() {
                    for (key, val) in obj {
                        match val {
                            serde_json::Value::String(s) => println!("{key}: {s}"),
                            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                                println!("{key}: {}", serde_json::to_string_pretty(val)?)
                            }
                            other => println!("{key}: {other}"),
                        }
                    }
                } else {
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
            }

            ReportCommand::Delete { id, all } => {
                if *all {
                    let count = store.delete_all()?;
                    formatter.success(&format!("Deleted {count} report(s)"));
                } else if let Some(report_id) = id {
                    if !store.delete(report_id)? {
                        bail!("Report '{report_id}' not found");
                    }
                    formatter.success(&format!("Deleted report '{report_id}'"));
                } else {
                    bail!("Specify a report ID or use --all");
                }
            }
        }

        Ok(())
    }
}
