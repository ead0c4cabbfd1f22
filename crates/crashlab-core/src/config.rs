//! Configuration module for CrashLab.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::CrashlabError;

/// Top-level configuration for CrashLab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub faults: FaultsConfig,
    pub flood: FloodConfig,
    pub logging: LoggingConfig,
    pub reports: ReportsConfig,
    pub prefs: PrefsConfig,
}

/// Backend-specific telemetry settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    pub sentry: SentryOptions,
}

/// Typed Sentry client options.
///
/// Only the options listed here can be set, either in YAML or through the
/// matching `SENTRY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SentryOptions {
    /// Project DSN. `None` leaves the client disabled.
    pub dsn: Option<String>,
    pub debug: bool,
    /// Start a release-health session automatically.
    pub auto_session_tracking: bool,
    pub attach_stacktrace: bool,
    pub send_default_pii: bool,
    /// Error event sample rate (0.0 - 1.0).
    pub sample_rate: f32,
    /// Transaction sample rate (0.0 - 1.0).
    pub traces_sample_rate: f32,
    pub max_breadcrumbs: usize,
    /// Overrides the reported server name.
    pub server_name: Option<String>,
}

/// Fault catalog tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaultsConfig {
    /// Default duration of the hang actions, in seconds.
    pub hang_seconds: u64,
    /// Stack size of the thread used by `native_stack_overflow` (KiB).
    pub stack_overflow_stack_kb: usize,
    /// First allocation size of `oom_heap` (MiB).
    pub heap_initial_mb: u64,
    /// Maximum single allocation size of `oom_heap` (MiB).
    pub heap_max_block_mb: u64,
    /// Optional total budget for `oom_heap` (MiB); exceeding it counts as OOM.
    pub heap_limit_mb: Option<u64>,
    /// Path `file_write_denied` tries to write. Defaults to an OS-protected
    /// location for the current platform.
    pub denied_path: Option<PathBuf>,
}

/// Asset flood settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FloodConfig {
    /// Resource label; resolved as a subdirectory of `assets_dir`.
    pub label: String,
    /// Root directory of loadable resources.
    pub assets_dir: PathBuf,
    /// Arena budget (MiB). Exceeding it is treated as out of memory.
    pub memory_budget_mb: Option<u64>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Crash report storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportsConfig {
    /// Report directory. `None` uses the platform data directory.
    pub dir: Option<PathBuf>,
}

/// Durable prefs storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrefsConfig {
    /// Prefs file. `None` uses the platform data directory.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, CrashlabError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/crashlab/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("crashlab")
            .join("config.yaml")
    }
}

impl Default for SentryOptions {
    fn default() -> Self {
        Self {
            dsn: None,
            debug: false,
            auto_session_tracking: true,
            attach_stacktrace: true,
            send_default_pii: false,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
            max_breadcrumbs: 100,
            server_name: None,
        }
    }
}

impl Default for FaultsConfig {
    fn default() -> Self {
        Self {
            hang_seconds: 10,
            stack_overflow_stack_kb: 64,
            heap_initial_mb: 64,
            heap_max_block_mb: 512,
            heap_limit_mb: None,
            denied_path: None,
        }
    }
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            label: "crashlab.asset_flood".to_string(),
            assets_dir: PathBuf::from("assets"),
            memory_budget_mb: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl FaultsConfig {
    /// The path `file_write_denied` writes to.
    pub fn denied_path(&self) -> PathBuf {
        self.denied_path.clone().unwrap_or_else(default_denied_path)
    }
}

#[cfg(target_os = "windows")]
fn default_denied_path() -> PathBuf {
    PathBuf::from("C:/Windows/System32/_crashlab_denied.txt")
}

/// `/root` is owner-only, so a regular user gets `EACCES`. Root can write
/// there, and falls back to procfs, which refuses new files.
#[cfg(target_os = "linux")]
fn default_denied_path() -> PathBuf {
    if is_root() {
        PathBuf::from("/proc/_crashlab_denied.txt")
    } else {
        PathBuf::from("/root/_crashlab_denied.txt")
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn default_denied_path() -> PathBuf {
    if is_root() {
        PathBuf::from("/dev/null/_crashlab_denied.txt")
    } else {
        PathBuf::from("/_crashlab_denied.txt")
    }
}

#[cfg(not(any(unix, windows)))]
fn default_denied_path() -> PathBuf {
    PathBuf::from("/_crashlab_denied.txt")
}

#[cfg(unix)]
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

// ---------------------------------------------------------------------------
// Sentry environment overrides
// ---------------------------------------------------------------------------

/// Prefix reserved for free-form Sentry options; none are accepted.
const SENTRY_OPT_PREFIX: &str = "SENTRY_OPT_";

impl SentryOptions {
    /// Environment variables understood by [`apply_env_overrides`](Self::apply_env_overrides).
    pub const ENV_VARS: &'static [&'static str] = &[
        "SENTRY_DSN",
        "SENTRY_DEBUG",
        "SENTRY_AUTO_SESSION_TRACKING",
        "SENTRY_ATTACH_STACKTRACE",
        "SENTRY_SEND_DEFAULT_PII",
        "SENTRY_TRACES_SAMPLE_RATE",
        "SENTRY_SAMPLE_RATE",
        "SENTRY_MAX_BREADCRUMBS",
        "SENTRY_SERVER_NAME",
    ];

    /// Apply `SENTRY_*` overrides from `vars` (normally `std::env::vars()`).
    ///
    /// Variables outside [`ENV_VARS`](Self::ENV_VARS) are ignored, except the
    /// `SENTRY_OPT_*` namespace which is rejected as an unknown option.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<(), CrashlabError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if key.starts_with(SENTRY_OPT_PREFIX) {
                return Err(CrashlabError::UnknownOption(key));
            }
            match key.as_str() {
                "SENTRY_DSN" => self.dsn = non_empty(value),
                "SENTRY_DEBUG" => self.debug = parse_bool(&key, &value)?,
                "SENTRY_AUTO_SESSION_TRACKING" => {
                    self.auto_session_tracking = parse_bool(&key, &value)?
                }
                "SENTRY_ATTACH_STACKTRACE" => self.attach_stacktrace = parse_bool(&key, &value)?,
                "SENTRY_SEND_DEFAULT_PII" => self.send_default_pii = parse_bool(&key, &value)?,
                "SENTRY_TRACES_SAMPLE_RATE" => {
                    self.traces_sample_rate = parse_value(&key, &value, "a number")?
                }
                "SENTRY_SAMPLE_RATE" => self.sample_rate = parse_value(&key, &value, "a number")?,
                "SENTRY_MAX_BREADCRUMBS" => {
                    self.max_breadcrumbs = parse_value(&key, &value, "an unsigned integer")?
                }
                "SENTRY_SERVER_NAME" => self.server_name = non_empty(value),
                _ => {}
            }
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CrashlabError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CrashlabError::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}

fn parse_value<T: std::str::FromStr>(
    key: &str,
    value: &str,
    expected: &'static str,
) -> Result<T, CrashlabError> {
    value
        .trim()
        .parse()
        .map_err(|_| CrashlabError::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        })
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"faults.hang_seconds"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str| {
            errors.push(ValidationError {
                field: field.into(),
                message: message.into(),
            })
        };

        // --- telemetry.sentry ---
        let sentry = &self.telemetry.sentry;
        if let Some(dsn) = &sentry.dsn {
            if !(dsn.starts_with("https://") || dsn.starts_with("http://")) {
                push("telemetry.sentry.dsn", "must be an http(s) URL");
            }
        }
        if !(0.0..=1.0).contains(&sentry.sample_rate) {
            push("telemetry.sentry.sample_rate", "must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&sentry.traces_sample_rate) {
            push(
                "telemetry.sentry.traces_sample_rate",
                "must be between 0.0 and 1.0",
            );
        }

        // --- faults ---
        if self.faults.stack_overflow_stack_kb < 16 {
            push("faults.stack_overflow_stack_kb", "must be at least 16");
        }
        if self.faults.heap_initial_mb == 0 {
            push("faults.heap_initial_mb", "must be greater than 0");
        }
        if self.faults.heap_max_block_mb < self.faults.heap_initial_mb {
            push(
                "faults.heap_max_block_mb",
                "must be greater than or equal to faults.heap_initial_mb",
            );
        }
        if self.faults.heap_limit_mb == Some(0) {
            push("faults.heap_limit_mb", "must be greater than 0 when set");
        }

        // --- flood ---
        if self.flood.label.trim().is_empty() {
            push("flood.label", "must not be empty");
        }
        if self.flood.label.contains("..") {
            push("flood.label", "must not contain '..'");
        }
        if self.flood.memory_budget_mb == Some(0) {
            push("flood.memory_budget_mb", "must be greater than 0 when set");
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                &format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use crashlab_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .hang_seconds(2)
///     .flood_memory_budget_mb(256)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- telemetry ---

    pub fn sentry_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.config.telemetry.sentry.dsn = Some(dsn.into());
        self
    }

    pub fn sentry_options(mut self, options: SentryOptions) -> Self {
        self.config.telemetry.sentry = options;
        self
    }

    // --- faults ---

    pub fn hang_seconds(mut self, seconds: u64) -> Self {
        self.config.faults.hang_seconds = seconds;
        self
    }

    pub fn stack_overflow_stack_kb(mut self, kb: usize) -> Self {
        self.config.faults.stack_overflow_stack_kb = kb;
        self
    }

    pub fn heap_initial_mb(mut self, mb: u64) -> Self {
        self.config.faults.heap_initial_mb = mb;
        self
    }

    pub fn heap_max_block_mb(mut self, mb: u64) -> Self {
        self.config.faults.heap_max_block_mb = mb;
        self
    }

    pub fn heap_limit_mb(mut self, mb: u64) -> Self {
        self.config.faults.heap_limit_mb = Some(mb);
        self
    }

    pub fn denied_path(mut self, path: PathBuf) -> Self {
        self.config.faults.denied_path = Some(path);
        self
    }

    // --- flood ---

    pub fn flood_label(mut self, label: impl Into<String>) -> Self {
        self.config.flood.label = label.into();
        self
    }

    pub fn flood_assets_dir(mut self, dir: PathBuf) -> Self {
        self.config.flood.assets_dir = dir;
        self
    }

    pub fn flood_memory_budget_mb(mut self, mb: u64) -> Self {
        self.config.flood.memory_budget_mb = Some(mb);
        self
    }

    // --- logging / storage ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn reports_dir(mut self, dir: PathBuf) -> Self {
        self.config.reports.dir = Some(dir);
        self
    }

    pub fn prefs_path(mut self, path: PathBuf) -> Self {
        self.config.prefs.path = Some(path);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
