//! Meta command - View and apply telemetry metadata
//!
//! `apply` and `reset` go through the telemetry router: values are persisted
//! to prefs and the initialized backend receives the merged metadata.

use anyhow::{bail, Result};
use clap::Subcommand;

use crashlab_core::domain::{MetadataUpdate, TelemetryMetadata};

use crate::app::{open_prefs, AppContext, Session};
use crate::output::get_formatter;

/// Metadata subcommands
#[derive(Debug, Subcommand)]
pub enum MetaCommand {
    /// Show the persisted metadata values
    Show,
    /// Update one or more metadata fields
    Apply {
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        run_id: Option<String>,
        #[arg(long)]
        environment: Option<String>,
        #[arg(long)]
        commit_sha: Option<String>,
        #[arg(long)]
        build_number: Option<String>,
        #[arg(long)]
        dev_mode: Option<String>,
        #[arg(long)]
        server_name: Option<String>,
    },
    /// Restore defaults for every field except the user id
    Reset,
}

impl MetaCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let formatter = get_formatter(app.format);

        let update = match self {
            MetaCommand::Show => {
                let store = open_prefs(&app.config)?;
                let saved = MetadataUpdate::load_saved(&store);
                if app.format.is_json() {
                    formatter.print_json(&serde_json::to_value(&saved)?);
                } else {
                    print_fields(&saved);
                }
                return Ok(());
            }
            MetaCommand::Apply {
                user_id,
                run_id,
                environment,
                commit_sha,
                build_number,
                dev_mode,
                server_name,
            } => MetadataUpdate {
                user_id: user_id.clone(),
                run_id: run_id.clone(),
                environment: environment.clone(),
                commit_sha: commit_sha.clone(),
                build_number: build_number.clone(),
                dev_mode: dev_mode.clone(),
                server_name: server_name.clone(),
            },
            MetaCommand::Reset => MetadataUpdate::reset_defaults(),
        };

        if update.is_empty() {
            bail!("Nothing to apply; pass at least one field, e.g. --environment staging");
        }

        let session = Session::start(app)?;
        let applied = app
            .router
            .apply_metadata_update(&update, session.store.as_ref());

        match applied {
            Some(metadata) if app.format.is_json() => {
                formatter.print_json(&serde_json::to_value(&metadata)?);
            }
            Some(metadata) => {
                formatter.success(&format!("Applied metadata to {}", app.router.backend_name()));
                print_metadata(&metadata);
            }
            None => formatter.warn("Telemetry is not initialized; values were only persisted"),
        }
        Ok(())
    }
}

fn print_fields(update: &MetadataUpdate) {
    let rows = [
        ("user_id", &update.user_id),
        ("run_id", &update.run_id),
        ("environment", &update.environment),
        ("commit_sha", &update.commit_sha),
        ("build_number", &update.build_number),
        ("dev_mode", &update.dev_mode),
        ("server_name", &update.server_name),
    ];
    for (name, value) in rows {
        println!("{:<14} {}", name, value.as_deref().unwrap_or("(unset)"));
    }
}

fn print_metadata(metadata: &TelemetryMetadata) {
    for (name, value) in metadata.iter() {
        println!("  {:<14} {}", name, value);
    }
}
