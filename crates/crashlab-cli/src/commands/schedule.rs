//! Schedule command - Arm the startup trampoline
//!
//! Stores an action that the next `run`, `interactive`, `deeplink` or
//! `intent` invocation executes before doing anything else.

use anyhow::{bail, Result};

use crashlab_faults::catalog;
use crashlab_faults::startup::{self, DEFAULT_STARTUP_ACTION, STARTUP_ACTION_KEY};

use crate::app::{open_prefs, AppContext};
use crate::output::get_formatter;

/// Arguments for the schedule-startup subcommand
#[derive(Debug, clap::Args)]
pub struct ScheduleStartupCommand {
    /// Action to run on next launch
    #[arg(long, default_value = DEFAULT_STARTUP_ACTION)]
    pub action: String,

    /// Remove the pending action instead of scheduling one
    #[arg(long, conflicts_with = "action")]
    pub clear: bool,
}

impl ScheduleStartupCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let formatter = get_formatter(app.format);
        let store = open_prefs(&app.config)?;

        if self.clear {
            let removed = startup::take_scheduled(&store, STARTUP_ACTION_KEY);
            if app.format.is_json() {
                formatter.print_json(&serde_json::json!({ "cleared": removed }));
            } else {
                match removed {
                    Some(action) => formatter.success(&format!("Cleared pending action {action}")),
                    None => formatter.info("No startup action pending."),
                }
            }
            return Ok(());
        }

        let Some(action) = catalog::find(self.action.trim()) else {
            bail!(
                "Unknown action '{}'. Run 'crashlab list' to see available actions",
                self.action
            );
        };

        startup::schedule(&store, STARTUP_ACTION_KEY, action.key);
        if app.format.is_json() {
            formatter.print_json(&serde_json::json!({ "scheduled": action.key }));
        } else {
            formatter.success(&format!("{} will run on next launch", action.key));
        }
        Ok(())
    }
}
