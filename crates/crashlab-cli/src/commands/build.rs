//! Build command - Plan backend builds and inspect their sidecars
//!
//! Provides the `crashlab build` CLI command with subcommands:
//! - `plan <target> <flavor>`: Resolve one build, optionally writing its sidecar
//! - `matrix`: Every supported (target, flavor) pair
//! - `read [path]`: Print a `build.json` sidecar

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use crashlab_core::build::{
    default_private_dir, plan_matrix, read_sidecar, BuildOptions, BuildPlan, SIDECAR_FILE,
};

use crate::app::AppContext;
use crate::output::{get_formatter, Table};

/// Build planning subcommands
#[derive(Debug, Subcommand)]
pub enum BuildCommand {
    /// Resolve one (target, flavor) build
    Plan {
        /// windows-x64, macos-arm64, android-arm64, ios-arm64 or linux-x64
        target: String,
        /// sentry, crashlytics, unity (unknown values fall back to unity)
        flavor: String,
        /// Development build
        #[arg(long)]
        development: bool,
        /// Override the player output path
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write build.json to the private dir and the artifact dir
        #[arg(long)]
        write_sidecar: bool,
        /// Private sidecar directory
        #[arg(long, requires = "write_sidecar")]
        private_dir: Option<PathBuf>,
    },
    /// List every supported (target, flavor) pair
    Matrix {
        /// Development builds
        #[arg(long)]
        development: bool,
    },
    /// Print a build.json sidecar
    Read {
        /// Sidecar path (defaults to the private dir copy)
        path: Option<PathBuf>,
    },
}

impl BuildCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let formatter = get_formatter(app.format);

        match self {
            BuildCommand::Plan {
                target,
                flavor,
                development,
                output,
                write_sidecar,
                private_dir,
            } => {
                let options = BuildOptions::from_env(*development, output.clone());
                let plan = BuildPlan::resolve(target, flavor, &options)?;

                let written = if *write_sidecar {
                    let dir = private_dir.clone().unwrap_or_else(default_private_dir);
                    plan.write_sidecar(&dir)
                } else {
                    Vec::new()
                };

                if app.format.is_json() {
                    let mut json = serde_json::to_value(&plan)?;
                    json["cargo_args"] = serde_json::json!(plan.cargo_args());
                    json["cargo_env"] = plan
                        .cargo_env()
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
                        .collect::<serde_json::Map<_, _>>()
                        .into();
                    json["sidecars"] = serde_json::json!(written);
                    formatter.print_json(&json);
                } else {
                    print_plan(&plan);
                    for path in &written {
                        formatter.success(&format!("Wrote {}", path.display()));
                    }
                    if *write_sidecar && written.len() < 2 {
                        formatter.warn("Some sidecar copies could not be written");
                    }
                }
            }

            BuildCommand::Matrix { development } => {
                let options = BuildOptions::from_env(*development, None);
                let plans = plan_matrix(&options);

                if app.format.is_json() {
                    formatter.print_json(&serde_json::to_value(&plans)?);
                } else {
                    let mut table = Table::new(&[
                        ("TARGET", 15),
                        ("FLAVOR", 12),
                        ("TRIPLE", 26),
                        ("FEATURE", 0),
                    ]);
                    for plan in &plans {
                        table.row(vec![
                            plan.target.to_string(),
                            plan.flavor.to_string(),
                            plan.triple.to_string(),
                            plan.cargo_feature.unwrap_or("-").to_string(),
                        ]);
                    }
                    table.print("build");
                }
            }

            BuildCommand::Read { path } => {
                let path = path
                    .clone()
                    .unwrap_or_else(|| default_private_dir().join(SIDECAR_FILE));
                let metadata = read_sidecar(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;

                if app.format.is_json() {
                    formatter.print_json(&serde_json::to_value(&metadata)?);
                } else {
                    println!("target:      {}", metadata.target);
                    println!("flavor:      {}", metadata.flavor);
                    println!("development: {}", metadata.development);
                    println!("output:      {}", metadata.output);
                    println!("commit_sha:  {}", metadata.commit_sha);
                }
            }
        }

        Ok(())
    }
}

fn print_plan(plan: &BuildPlan) {
    println!("Target:       {} ({})", plan.target, plan.triple);
    println!("Flavor:       {}", plan.flavor);
    println!("Feature:      {}", plan.cargo_feature.unwrap_or("-"));
    println!("App id:       {}", plan.application_id);
    println!("Artifacts:    {}", plan.artifact_dir.display());
    println!("Output:       {}", plan.output.display());
    println!("Development:  {}", plan.metadata.development);
    println!("Commit:       {}", plan.metadata.commit_sha);
    println!();
    let env: Vec<String> = plan.cargo_env().iter().map(|(k, v)| format!("{k}={v}")).collect();
    println!("{} cargo {}", env.join(" "), plan.cargo_args().join(" "));
}
