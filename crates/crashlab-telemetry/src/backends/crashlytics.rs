//! Crashlytics-style backend
//!
//! There is no Rust SDK, so the backend keeps the same contract locally:
//! user id and custom keys, a 64 KiB log tail, and a crash report written by
//! a panic hook for an out-of-process uploader to pick up. Native faults
//! never reach the hook; their report is written just before the signal.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use tracing::{info, warn};

use crashlab_core::domain::{CrashlabError, TelemetryMetadata, MARKER_NAMESPACE};
use crashlab_core::ports::{ITelemetryService, LogLevel};

use crate::crash_report::{
    install_crash_reporter, save_native_crash_report, CrashContext, LOG_TAIL_BYTES,
};

const WRITE_CHECK_FILE: &str = ".crashlab-write-check";

/// Crashlytics-compatible telemetry service
pub struct CrashlyticsTelemetryService {
    reports_dir: PathBuf,
    context: Arc<CrashContext>,
    collection_enabled: AtomicBool,
    hook: Once,
}

impl CrashlyticsTelemetryService {
    pub fn new(reports_dir: PathBuf) -> Self {
        Self {
            reports_dir,
            context: Arc::new(CrashContext::new(LOG_TAIL_BYTES)),
            collection_enabled: AtomicBool::new(false),
            hook: Once::new(),
        }
    }

    pub fn is_collection_enabled(&self) -> bool {
        self.collection_enabled.load(Ordering::Acquire)
    }

    pub fn context(&self) -> &CrashContext {
        &self.context
    }

    fn set_user(&self, user_id: &str, metadata: &TelemetryMetadata) {
        self.context.set_key("user_id", user_id);
        self.context.set_keys(metadata.iter());
    }
}

/// Collection needs a writable report directory.
fn check_dependencies(reports_dir: &Path) -> Result<(), CrashlabError> {
    std::fs::create_dir_all(reports_dir)?;
    let check = reports_dir.join(WRITE_CHECK_FILE);
    std::fs::write(&check, b"ok")?;
    std::fs::remove_file(&check)?;
    Ok(())
}

impl ITelemetryService for CrashlyticsTelemetryService {
    fn name(&self) -> &'static str {
        "crashlytics"
    }

    fn initialize(&self, user_id: &str, metadata: &TelemetryMetadata, _release: &str, _environment: &str) {
        if let Err(e) = check_dependencies(&self.reports_dir) {
            warn!(
                "Crashlytics dependencies not available ({}): {e}",
                self.reports_dir.display()
            );
            return;
        }

        self.collection_enabled.store(true, Ordering::Release);
        self.set_user(user_id, metadata);
        self.context.log("CrashLab Crashlytics initialized");
        self.hook.call_once(|| {
            install_crash_reporter(self.reports_dir.clone(), "crashlytics", self.context.clone());
        });
        info!("{MARKER_NAMESPACE}::CRASHLYTICS::initialized");
    }

    fn on_log(&self, message: &str, _stack_trace: Option<&str>, _level: LogLevel) {
        if self.is_collection_enabled() {
            self.context.log(message);
        }
    }

    fn ensure_session(&self, _reason: Option<&str>) {}

    fn apply_metadata(&self, metadata: &TelemetryMetadata) {
        if self.is_collection_enabled() {
            self.set_user(&metadata.user_id, metadata);
        }
    }

    fn record_native_crash(&self, action: &str, fault: &str) {
        if !self.is_collection_enabled() {
            return;
        }
        self.context.log(&format!("{MARKER_NAMESPACE}::{action}::NATIVE::{fault}"));
        if let Err(e) = save_native_crash_report(&self.reports_dir, "crashlytics", &self.context, action, fault) {
            warn!("Failed to save native crash report: {e}");
        }
    }
}
