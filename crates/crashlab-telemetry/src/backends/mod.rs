//! Telemetry backends
//!
//! Exactly one backend is compiled into a binary, picked by the mutually
//! exclusive cargo features `sentry`, `crashlytics` and `unity-diagnostics`.
//! Without any of them the no-op backend is used.

use std::sync::Arc;

use crashlab_core::config::Config;
use crashlab_core::domain::Flavor;
use crashlab_core::ports::ITelemetryService;

#[cfg(any(feature = "crashlytics", test))]
pub mod crashlytics;
pub mod noop;
#[cfg(feature = "sentry")]
pub mod sentry;
#[cfg(any(feature = "unity-diagnostics", test))]
pub mod unity;

pub use noop::NoTelemetryService;

/// Flavor selected by the enabled cargo feature.
pub const fn compiled_flavor() -> Flavor {
    if cfg!(feature = "sentry") {
        Flavor::Sentry
    } else if cfg!(feature = "crashlytics") {
        Flavor::Crashlytics
    } else if cfg!(feature = "unity-diagnostics") {
        Flavor::UnityDiagnostics
    } else {
        Flavor::None
    }
}

/// Builds the compiled backend from configuration.
pub fn compiled_backend(config: &Config) -> Arc<dyn ITelemetryService> {
    build(config)
}

#[cfg(feature = "sentry")]
fn build(config: &Config) -> Arc<dyn ITelemetryService> {
    Arc::new(sentry::SentryTelemetryService::new(
        config.telemetry.sentry.clone(),
    ))
}

#[cfg(feature = "crashlytics")]
fn build(config: &Config) -> Arc<dyn ITelemetryService> {
    Arc::new(crashlytics::CrashlyticsTelemetryService::new(
        crate::reports_dir(config),
    ))
}

#[cfg(feature = "unity-diagnostics")]
fn build(config: &Config) -> Arc<dyn ITelemetryService> {
    Arc::new(unity::UnityDiagnosticsTelemetryService::new(
        crate::reports_dir(config),
    ))
}

#[cfg(not(any(feature = "sentry", feature = "crashlytics", feature = "unity-diagnostics")))]
fn build(_config: &Config) -> Arc<dyn ITelemetryService> {
    Arc::new(NoTelemetryService)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_backend_matches_flavor() {
        let backend = compiled_backend(&Config::default());
        assert_eq!(backend.name(), compiled_flavor().backend_name());
    }
}
