//! Deep-link and intent triggers
//!
//! The headless entry points used by automation. Both run the startup
//! trampoline first, like any launch, then dispatch the named action.
//! Unknown actions are logged and the process exits normally.

use anyhow::Result;

use crashlab_faults::dispatch;

use super::run::DETACHED_SETTLE;
use crate::app::{AppContext, Session};
use crate::output::{get_formatter, OutputFormat};

/// Arguments for the deeplink subcommand
#[derive(Debug, clap::Args)]
pub struct DeepLinkCommand {
    /// URL of the form crashlab://action/<ACTION>
    pub url: String,
}

/// Arguments for the intent subcommand
#[derive(Debug, clap::Args)]
pub struct IntentCommand {
    /// Value of the crash_action extra
    pub action: String,
}

impl DeepLinkCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let session = Session::launch(app)?;
        let handled = dispatch::handle_deep_link(&session.faults, &self.url);
        finish(app.format, handled, &self.url).await
    }
}

impl IntentCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let session = Session::launch(app)?;
        let handled = dispatch::handle_intent(&session.faults, &self.action);
        finish(app.format, handled, &self.action).await
    }
}

async fn finish(format: OutputFormat, handled: bool, trigger: &str) -> Result<()> {
    let formatter = get_formatter(format);
    if handled {
        tokio::time::sleep(DETACHED_SETTLE).await;
    }

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "trigger": trigger,
            "handled": handled,
        }));
    } else if handled {
        formatter.success(&format!("Handled {trigger}"));
    } else {
        formatter.warn(&format!("No action matched {trigger}"));
    }
    Ok(())
}
