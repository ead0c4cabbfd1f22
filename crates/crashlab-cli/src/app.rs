//! Process bootstrap shared by the commands
//!
//! [`AppContext`] is built once in `main` before tracing is installed, since
//! the telemetry router needs the configuration and the log subscriber needs
//! the router. Commands that touch the fault catalog then open a
//! [`Session`], which resolves metadata, initializes telemetry and runs the
//! startup trampoline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use crashlab_core::config::Config;
use crashlab_core::domain::TelemetryMetadata;
use crashlab_core::ports::ITelemetryService;
use crashlab_core::prefs::FileKeyValueStore;
use crashlab_faults::startup::{check_and_run, StartupCheck, STARTUP_ACTION_KEY};
use crashlab_faults::FaultContext;
use crashlab_telemetry::{compiled_flavor, TelemetryRouter};

use crate::output::OutputFormat;

/// Configuration, output format and the telemetry router
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub router: Arc<TelemetryRouter>,
}

/// Loads configuration from `path`, applies `SENTRY_*` overrides and
/// rejects configurations that fail validation.
///
/// A missing file yields the defaults unless the path was given explicitly.
pub fn load_config(path: &Path, explicit: bool) -> Result<Config> {
    let mut config = if path.exists() || explicit {
        Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?
    } else {
        Config::default()
    };

    config
        .telemetry
        .sentry
        .apply_env_overrides(std::env::vars())
        .context("Invalid Sentry environment override")?;

    // An unchecked logging.level would become a target directive and hide
    // the action markers.
    let errors = config.validate();
    if !errors.is_empty() {
        let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!(
            "Invalid configuration in {}: {}. Run 'crashlab config validate' for details",
            path.display(),
            errors.join("; ")
        );
    }

    Ok(config)
}

/// Opens the prefs store named by the configuration.
pub fn open_prefs(config: &Config) -> Result<FileKeyValueStore> {
    let path = config
        .prefs
        .path
        .clone()
        .unwrap_or_else(FileKeyValueStore::default_path);
    FileKeyValueStore::open(path.clone())
        .with_context(|| format!("Failed to open prefs store {}", path.display()))
}

/// A process that is about to run fault actions
pub struct Session {
    pub store: Arc<FileKeyValueStore>,
    pub faults: FaultContext,
}

impl Session {
    /// Opens prefs and initializes telemetry.
    pub fn start(app: &AppContext) -> Result<Self> {
        let store = Arc::new(open_prefs(&app.config)?);

        let metadata = TelemetryMetadata::from_env(store.as_ref(), compiled_flavor());
        info!(backend = app.router.backend_name(), "Starting CrashLab session");
        app.router.start(metadata);
        app.router.ensure_session(Some("startup"));

        let faults = FaultContext::new(&app.config, store.clone(), app.router.clone());
        Ok(Self { store, faults })
    }

    /// [`start`](Self::start), then run whatever the previous launch scheduled.
    pub fn launch(app: &AppContext) -> Result<Self> {
        let session = Self::start(app)?;
        session.run_startup_check();
        Ok(session)
    }

    pub fn run_startup_check(&self) -> StartupCheck {
        check_and_run(&self.faults, STARTUP_ACTION_KEY)
    }
}
