//! CrashLab CLI - Fault-injection harness
//!
//! Provides commands for:
//! - Listing and running catalog actions
//! - An interactive loop that survives recoverable faults
//! - Deep-link and intent triggers for automation
//! - Scheduling a fault for the next launch
//! - Viewing and applying telemetry metadata
//! - Planning builds and reading build sidecars
//! - Managing local crash reports

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crashlab_core::config::Config;
use crashlab_telemetry::TelemetryRouter;

mod app;
mod commands;
mod output;

use app::{load_config, AppContext};
use commands::{
    build::BuildCommand,
    completions::CompletionsCommand,
    config::ConfigCommand,
    interactive::InteractiveCommand,
    list::ListCommand,
    meta::MetaCommand,
    report::ReportCommand,
    run::RunCommand,
    schedule::ScheduleStartupCommand,
    trigger::{DeepLinkCommand, IntentCommand},
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "crashlab", version, about = "Controlled fault-injection harness")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List catalog actions
    List(ListCommand),
    /// Run one catalog action
    Run(RunCommand),
    /// Pick actions from a prompt; recoverable faults do not end the session
    Interactive(InteractiveCommand),
    /// Handle a crashlab://action/<ACTION> deep link
    Deeplink(DeepLinkCommand),
    /// Handle a crash_action intent extra
    Intent(IntentCommand),
    /// Schedule an action for the next launch
    ScheduleStartup(ScheduleStartupCommand),
    /// View and apply telemetry metadata
    #[command(subcommand)]
    Meta(MetaCommand),
    /// Plan builds and read build metadata sidecars
    #[command(subcommand)]
    Build(BuildCommand),
    /// Manage local crash reports
    #[command(subcommand)]
    Report(ReportCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = match load_config(&config_path, cli.config.is_some()) {
        Ok(config) => config,
        // `config validate` reports load errors itself.
        Err(_) if matches!(cli.command, Commands::Config(_)) => Config::default(),
        Err(e) => return Err(e),
    };

    let router = Arc::new(TelemetryRouter::compiled(&config));

    // Setup tracing
    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .with(router.layer())
        .init();

    let app = AppContext {
        config,
        config_path,
        format: OutputFormat::from_json_flag(cli.json),
        router,
    };

    match cli.command {
        Commands::List(cmd) => cmd.execute(&app).await,
        Commands::Run(cmd) => cmd.execute(&app).await,
        Commands::Interactive(cmd) => cmd.execute(&app).await,
        Commands::Deeplink(cmd) => cmd.execute(&app).await,
        Commands::Intent(cmd) => cmd.execute(&app).await,
        Commands::ScheduleStartup(cmd) => cmd.execute(&app).await,
        Commands::Meta(cmd) => cmd.execute(&app).await,
        Commands::Build(cmd) => cmd.execute(&app).await,
        Commands::Report(cmd) => cmd.execute(&app).await,
        Commands::Config(cmd) => cmd.execute(&app).await,
        Commands::Completions(cmd) => cmd.execute(&app).await,
    }
}
