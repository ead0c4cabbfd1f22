//! Telemetry service port
//!
//! One implementation of [`ITelemetryService`] is compiled into each binary.
//! All methods are infallible by signature: backend failures are the
//! implementation's problem and end up as warnings in the log, never as
//! errors surfaced to the harness.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{TelemetryMetadata, MARKER_NAMESPACE};

/// Severity of a mirrored log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    /// Failed assertion, reported like an error
    Assert,
}

impl LogLevel {
    /// Collapses a log level to the severity recorded by backends:
    /// error/assert → error, warning → warning, everything else → info.
    pub fn breadcrumb_level(&self) -> BreadcrumbLevel {
        match self {
            LogLevel::Error | LogLevel::Assert => BreadcrumbLevel::Error,
            LogLevel::Warning => BreadcrumbLevel::Warning,
            LogLevel::Trace | LogLevel::Debug | LogLevel::Info => BreadcrumbLevel::Info,
        }
    }
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => LogLevel::Error,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::TRACE => LogLevel::Trace,
        }
    }
}

/// Severity of a breadcrumb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for BreadcrumbLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreadcrumbLevel::Debug => "Debug",
            BreadcrumbLevel::Info => "Info",
            BreadcrumbLevel::Warning => "Warning",
            BreadcrumbLevel::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

/// A lightweight, timestamped event giving context to a later report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub message: String,
    pub category: String,
    pub level: BreadcrumbLevel,
    pub data: BTreeMap<String, String>,
}

impl Breadcrumb {
    /// Default category for harness breadcrumbs.
    pub const DEFAULT_CATEGORY: &'static str = "crashlab";

    /// Creates a breadcrumb in the default category.
    pub fn new(level: BreadcrumbLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: Self::DEFAULT_CATEGORY.to_string(),
            level,
            data: BTreeMap::new(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(BreadcrumbLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(BreadcrumbLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(BreadcrumbLevel::Error, message)
    }

    /// Sets the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Adds one data entry
    pub fn with_data(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.data.insert(key.into(), value.to_string());
        self
    }

    /// Log-line rendering used when no backend takes breadcrumbs:
    /// `CRASHLAB::BREADCRUMB::<category>::<Level>::<message>[::k=v;k=v]`.
    pub fn render(&self) -> String {
        let mut line = format!(
            "{MARKER_NAMESPACE}::BREADCRUMB::{}::{}::{}",
            self.category, self.level, self.message
        );
        if !self.data.is_empty() {
            let data = self
                .data
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(";");
            line.push_str("::");
            line.push_str(&data);
        }
        line
    }
}

/// Port trait for the compiled observability backend
///
/// ## Implementation Notes
///
/// - `initialize` is called at most once per process by the router; it must
///   catch and log every backend failure.
/// - `on_log` is called for every log line. Backends that already capture
///   panics automatically must only record breadcrumbs here, never submit a
///   second top-level error event.
/// - `ensure_session` is a best-effort session start / heartbeat.
/// - `record_native_crash` runs on the faulting thread just before a signal
///   or abort ends the process. No panic hook sees those faults, so this is
///   the backend's last chance to leave a report behind.
pub trait ITelemetryService: Send + Sync {
    /// Backend name as reported in metadata (`sentry`, `crashlytics`, ...).
    fn name(&self) -> &'static str;

    /// Connects to the backend and attaches `metadata` as tags / custom keys.
    fn initialize(
        &self,
        user_id: &str,
        metadata: &TelemetryMetadata,
        release: &str,
        environment: &str,
    );

    /// Mirrors one log line into the backend.
    fn on_log(&self, message: &str, stack_trace: Option<&str>, level: LogLevel);

    /// Starts or refreshes a session.
    fn ensure_session(&self, reason: Option<&str>);

    /// Pushes updated metadata to the backend.
    fn apply_metadata(&self, _metadata: &TelemetryMetadata) {}

    /// Records that `action` is about to end the process with `fault`
    /// (`SIGSEGV`, `abort`, ...).
    fn record_native_crash(&self, _action: &str, _fault: &str) {}

    /// Records a breadcrumb; backends without a breadcrumb API log it instead.
    fn add_breadcrumb(&self, breadcrumb: &Breadcrumb) {
        match breadcrumb.level {
            BreadcrumbLevel::Error => tracing::error!("{}", breadcrumb.render()),
            BreadcrumbLevel::Warning => tracing::warn!("{}", breadcrumb.render()),
            BreadcrumbLevel::Info => tracing::info!("{}", breadcrumb.render()),
            BreadcrumbLevel::Debug => tracing::debug!("{}", breadcrumb.render()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breadcrumb_level_mapping() {
        assert_eq!(LogLevel::Error.breadcrumb_level(), BreadcrumbLevel::Error);
        assert_eq!(LogLevel::Assert.breadcrumb_level(), BreadcrumbLevel::Error);
        assert_eq!(LogLevel::Warning.breadcrumb_level(), BreadcrumbLevel::Warning);
        assert_eq!(LogLevel::Info.breadcrumb_level(), BreadcrumbLevel::Info);
        assert_eq!(LogLevel::Debug.breadcrumb_level(), BreadcrumbLevel::Info);
        assert_eq!(LogLevel::Trace.breadcrumb_level(), BreadcrumbLevel::Info);
    }

    #[test]
    fn test_tracing_level_conversion() {
        assert_eq!(LogLevel::from(&tracing::Level::ERROR), LogLevel::Error);
        assert_eq!(LogLevel::from(&tracing::Level::WARN), LogLevel::Warning);
        assert_eq!(LogLevel::from(&tracing::Level::TRACE), LogLevel::Trace);
    }

    #[test]
    fn test_render_without_data() {
        let crumb = Breadcrumb::info("Asset bundle flood requested");
        assert_eq!(
            crumb.render(),
            "CRASHLAB::BREADCRUMB::crashlab::Info::Asset bundle flood requested"
        );
    }

    #[test]
    fn test_render_with_data() {
        let crumb = Breadcrumb::warning("load failed")
            .with_category("crashlab.asset_bundle_flood")
            .with_data("location", "a.bin")
            .with_data("attempt", 2);
        assert_eq!(
            crumb.render(),
            "CRASHLAB::BREADCRUMB::crashlab.asset_bundle_flood::Warning::load failed::attempt=2;location=a.bin"
        );
    }
}
