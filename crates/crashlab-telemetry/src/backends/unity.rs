//! Unity Cloud Diagnostics-style backend
//!
//! User metadata is attached to crash reports written by a panic hook, or
//! just before the signal for native faults.
//! The service has no breadcrumb API, so mirrored log lines are dropped.

use std::path::PathBuf;
use std::sync::{Arc, Once};

use tracing::{info, warn};

use crashlab_core::domain::{TelemetryMetadata, MARKER_NAMESPACE};
use crashlab_core::ports::{ITelemetryService, LogLevel};

use crate::crash_report::{install_crash_reporter, save_native_crash_report, CrashContext};

/// Unity diagnostics-compatible telemetry service
pub struct UnityDiagnosticsTelemetryService {
    reports_dir: PathBuf,
    context: Arc<CrashContext>,
    hook: Once,
}

impl UnityDiagnosticsTelemetryService {
    pub fn new(reports_dir: PathBuf) -> Self {
        Self {
            reports_dir,
            context: Arc::new(CrashContext::new(0)),
            hook: Once::new(),
        }
    }

    pub fn user_metadata(&self) -> std::collections::BTreeMap<String, String> {
        self.context.keys()
    }

    fn set_user_metadata(&self, user_id: &str, metadata: &TelemetryMetadata) {
        self.context.set_key("user_id", user_id);
        self.context.set_keys(metadata.iter());
    }
}

impl ITelemetryService for UnityDiagnosticsTelemetryService {
    fn name(&self) -> &'static str {
        "unity"
    }

    fn initialize(&self, user_id: &str, metadata: &TelemetryMetadata, _release: &str, environment: &str) {
        if let Err(e) = std::fs::create_dir_all(&self.reports_dir) {
            warn!(
                "Diagnostics report directory unavailable for environment {environment}: {e}"
            );
        }

        self.set_user_metadata(user_id, metadata);
        self.hook.call_once(|| {
            install_crash_reporter(self.reports_dir.clone(), "unity", self.context.clone());
        });
        info!("{MARKER_NAMESPACE}::UNITY_DIAGNOSTICS::initialized");
    }

    fn on_log(&self, _message: &str, _stack_trace: Option<&str>, _level: LogLevel) {}

    fn ensure_session(&self, _reason: Option<&str>) {}

    fn apply_metadata(&self, metadata: &TelemetryMetadata) {
        self.set_user_metadata(&metadata.user_id, metadata);
    }

    fn record_native_crash(&self, action: &str, fault: &str) {
        if let Err(e) = save_native_crash_report(&self.reports_dir, "unity", &self.context, action, fault) {
            warn!("Failed to save native crash report: {e}");
        }
    }
}
