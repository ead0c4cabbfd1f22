//! Backend used when no telemetry flavor is compiled in

use tracing::info;

use crashlab_core::domain::{TelemetryMetadata, MARKER_NAMESPACE};
use crashlab_core::ports::{ITelemetryService, LogLevel};

/// Logs the resolved metadata once; everything else is inert.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTelemetryService;

impl ITelemetryService for NoTelemetryService {
    fn name(&self) -> &'static str {
        "unknown"
    }

    fn initialize(&self, _user_id: &str, metadata: &TelemetryMetadata, _release: &str, _environment: &str) {
        info!("{MARKER_NAMESPACE}::META::{}", metadata.to_kvp_string());
    }

    fn on_log(&self, _message: &str, _stack_trace: Option<&str>, _level: LogLevel) {}

    fn ensure_session(&self, _reason: Option<&str>) {}
}
