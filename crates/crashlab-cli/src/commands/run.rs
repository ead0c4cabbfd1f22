//! Run command - Invoke one catalog action
//!
//! A fault raised by the action is not caught: it reaches the process
//! boundary like any unhandled error would.

use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::info;

use crashlab_faults::catalog::FaultArgs;
use crashlab_faults::dispatch;

use crate::app::{AppContext, Session};
use crate::output::get_formatter;

/// Time given to detached threads and tasks to fail before the process exits.
pub const DETACHED_SETTLE: Duration = Duration::from_millis(250);

/// Arguments for the run subcommand
#[derive(Debug, clap::Args)]
pub struct RunCommand {
    /// Action key (or legacy alias), see `crashlab list`
    pub action: String,

    /// Duration for the hang actions, in seconds
    #[arg(long)]
    pub seconds: Option<u64>,
}

impl RunCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let formatter = get_formatter(app.format);

        let action = dispatch::resolve(&self.action).ok_or_else(|| {
            anyhow!(
                "Unknown action '{}'. Run 'crashlab list' to see available actions",
                self.action
            )
        })?;
        if self.seconds.is_some() && !action.takes_seconds {
            formatter.warn(&format!("{} ignores --seconds", action.key));
        }

        let session = Session::launch(app)?;
        action.invoke(
            &session.faults,
            &FaultArgs {
                seconds: self.seconds,
            },
        );
        tokio::time::sleep(DETACHED_SETTLE).await;
        info!("Action {} returned", action.key);

        if app.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "action": action.key,
                "group": action.group,
                "returned": true,
            }));
        } else {
            formatter.success(&format!("{} returned", action.key));
        }
        Ok(())
    }
}
