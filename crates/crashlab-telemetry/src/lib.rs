//! CrashLab Telemetry - Build-time selected observability backends
//!
//! Provides:
//! - `TelemetryRouter`: one-time initialization, panic isolation, metadata updates
//! - `TelemetryLayer`: mirrors `tracing` events into the backend
//! - Backends: no-op, Sentry, Crashlytics-style, Unity-diagnostics-style
//! - `CrashReport`: Structured panic reports for SDK-less backends
//! - `LocalReportStore`: File-based report management

#[cfg(all(feature = "sentry", feature = "crashlytics"))]
compile_error!("features `sentry` and `crashlytics` are mutually exclusive");
#[cfg(all(feature = "sentry", feature = "unity-diagnostics"))]
compile_error!("features `sentry` and `unity-diagnostics` are mutually exclusive");
#[cfg(all(feature = "crashlytics", feature = "unity-diagnostics"))]
compile_error!("features `crashlytics` and `unity-diagnostics` are mutually exclusive");

use std::path::PathBuf;

use crashlab_core::config::Config;

pub mod backends;
pub mod crash_report;
mod guard;
pub mod layer;
pub mod os_info;
pub mod router;
pub mod store;

pub use backends::{compiled_backend, compiled_flavor};
pub use crash_report::{install_crash_reporter, save_crash_report, CrashContext, CrashReport};
pub use layer::TelemetryLayer;
pub use os_info::OsInfo;
pub use router::TelemetryRouter;
pub use store::{LocalReportStore, ReportEntry};

/// Report directory from configuration, or the platform default.
pub fn reports_dir(config: &Config) -> PathBuf {
    LocalReportStore::resolve_dir(config.reports.dir.as_deref())
}
