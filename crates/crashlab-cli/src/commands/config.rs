//! Config command - View and validate CrashLab configuration
//!
//! Provides the `crashlab config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports every error
//! 3. Prints the configuration path in use

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::info;

use crashlab_core::config::Config;

use crate::app::AppContext;
use crate::output::get_formatter;

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration, including SENTRY_* overrides
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(app),
            ConfigCommand::Validate => execute_validate(app),
            ConfigCommand::Path => {
                if app.format.is_json() {
                    get_formatter(app.format).print_json(&serde_json::json!({
                        "config_path": app.config_path.display().to_string(),
                        "exists": app.config_path.exists(),
                    }));
                } else {
                    println!("{}", app.config_path.display());
                }
                Ok(())
            }
        }
    }
}

fn execute_show(app: &AppContext) -> Result<()> {
    let formatter = get_formatter(app.format);
    info!(config_path = %app.config_path.display(), "Showing configuration");

    if app.format.is_json() {
        let json = serde_json::to_value(&app.config)
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", app.config_path.display()));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&app.config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_validate(app: &AppContext) -> Result<()> {
    let formatter = get_formatter(app.format);
    let path = &app.config_path;

    if !path.exists() {
        if app.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": true,
                "config_path": path.display().to_string(),
                "errors": [],
                "using_defaults": true,
            }));
        } else {
            formatter.info(&format!("Configuration file not found at {}", path.display()));
            formatter.info("Using default configuration.");
        }
        return Ok(());
    }

    // Reload from disk: the context holds defaults when the file failed to parse.
    let errors: Vec<String> = match Config::load(path) {
        Ok(config) => config.validate().iter().map(ToString::to_string).collect(),
        Err(e) => vec![format!("Failed to parse configuration: {e}")],
    };
    info!(config_path = %path.display(), errors = errors.len(), "Validated configuration");

    if app.format.is_json() {
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": errors,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", path.display()));
        for error in &errors {
            formatter.info(&format!("  {error}"));
        }
    }

    if !errors.is_empty() {
        bail!("Invalid configuration: {}", path.display());
    }
    Ok(())
}
