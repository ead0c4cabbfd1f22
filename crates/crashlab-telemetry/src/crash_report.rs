//! Crash report generation and persistence
//!
//! Backends without a Rust SDK hand crashes to an out-of-process uploader:
//! a panic hook writes one JSON report per panic into the report directory,
//! together with the custom keys and log tail the backend collected.

use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crashlab_core::domain::{panic_message, CrashlabError, FaultError};

use crate::os_info::OsInfo;

/// Size of the log tail kept for crash reports (64 KiB).
pub const LOG_TAIL_BYTES: usize = 64 * 1024;

/// `fault_kind` of reports written ahead of a native fault.
pub const NATIVE_FAULT_KIND: &str = "Native";

/// A structured crash report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashReport {
    pub id: String,
    pub timestamp: String,
    pub version: String,
    pub backend: String,
    pub panic_message: String,
    /// Kind of the deliberate fault, when the panic carried one.
    pub fault_kind: Option<String>,
    pub location: String,
    pub thread: String,
    pub backtrace: String,
    pub os_info: OsInfo,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl CrashReport {
    /// Create a new crash report.
    pub fn new(backend: &str, panic_message: &str, location: &str, backtrace: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            backend: backend.to_string(),
            panic_message: panic_message.to_string(),
            fault_kind: None,
            location: location.to_string(),
            thread: current_thread_name(),
            backtrace: backtrace.to_string(),
            os_info: OsInfo::collect(),
            metadata: BTreeMap::new(),
            logs: Vec::new(),
        }
    }

    /// Create a report from a panic payload, recognising deliberate faults.
    pub fn from_payload(
        backend: &str,
        payload: &(dyn Any + Send),
        location: &str,
        backtrace: &str,
    ) -> Self {
        let mut report = Self::new(backend, &panic_message(payload), location, backtrace);
        report.fault_kind = FaultError::from_payload(payload).map(|f| f.kind().to_string());
        report
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }
}

fn current_thread_name() -> String {
    std::thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_string()
}

/// Save a crash report to the reports directory.
///
/// Creates the directory if needed. File name: `crash-{date}-{uuid8}.json`
pub fn save_crash_report(reports_dir: &Path, report: &CrashReport) -> Result<PathBuf, CrashlabError> {
    std::fs::create_dir_all(reports_dir)?;

    let date = Utc::now().format("%Y%m%d");
    let short_id: String = report.id.chars().take(8).collect();
    let path = reports_dir.join(format!("crash-{date}-{short_id}.json"));

    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;

    Ok(path)
}

// ============================================================================
// Crash context
// ============================================================================

/// Bounded tail of log lines, oldest dropped first
#[derive(Debug, Clone)]
pub struct LogTail {
    lines: VecDeque<String>,
    bytes: usize,
    capacity: usize,
}

impl LogTail {
    /// A tail holding at most `capacity` bytes of text.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            capacity,
        }
    }

    pub fn push(&mut self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut line = line.to_string();
        if line.len() > self.capacity {
            let mut end = self.capacity;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            line.truncate(end);
        }
        self.bytes += line.len();
        self.lines.push_back(line);
        while self.bytes > self.capacity {
            match self.lines.pop_front() {
                Some(old) => self.bytes -= old.len(),
                None => break,
            }
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

/// Custom keys and log tail a backend attaches to its crash reports
#[derive(Debug)]
pub struct CrashContext {
    keys: Mutex<BTreeMap<String, String>>,
    tail: Mutex<LogTail>,
}

impl CrashContext {
    /// `log_capacity` of zero disables the log tail.
    pub fn new(log_capacity: usize) -> Self {
        Self {
            keys: Mutex::new(BTreeMap::new()),
            tail: Mutex::new(LogTail::with_capacity(log_capacity)),
        }
    }

    pub fn set_key(&self, key: &str, value: &str) {
        lock(&self.keys).insert(key.to_string(), value.to_string());
    }

    pub fn set_keys<'k, 'v>(&self, pairs: impl IntoIterator<Item = (&'k str, &'v str)>) {
        let mut keys = lock(&self.keys);
        for (key, value) in pairs {
            keys.insert(key.to_string(), value.to_string());
        }
    }

    pub fn log(&self, line: &str) {
        lock(&self.tail).push(line);
    }

    pub fn keys(&self) -> BTreeMap<String, String> {
        lock(&self.keys).clone()
    }

    pub fn logs(&self) -> Vec<String> {
        lock(&self.tail).lines()
    }

    /// Non-blocking copy for use inside the panic hook. A lock held by the
    /// panicking thread yields an empty section instead of a deadlock.
    fn snapshot(&self) -> (BTreeMap<String, String>, Vec<String>) {
        let keys = self.keys.try_lock().map(|k| k.clone()).unwrap_or_default();
        let logs = self.tail.try_lock().map(|t| t.lines()).unwrap_or_default();
        (keys, logs)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Saves a report for a native fault that is about to end the process.
///
/// Written before the fault is raised, since no hook runs after a signal.
pub fn save_native_crash_report(
    reports_dir: &Path,
    backend: &str,
    context: &CrashContext,
    action: &str,
    fault: &str,
) -> Result<PathBuf, CrashlabError> {
    let backtrace = std::backtrace::Backtrace::force_capture().to_string();
    let (keys, logs) = context.snapshot();

    let mut report = CrashReport::new(backend, &format!("Native fault: {fault}"), action, &backtrace)
        .with_metadata(keys)
        .with_logs(logs);
    report.fault_kind = Some(NATIVE_FAULT_KIND.to_string());
    save_crash_report(reports_dir, &report)
}

/// Installs a panic hook that saves crash reports to `reports_dir`.
///
/// Chains with the existing panic hook so default behavior (stderr output)
/// is preserved.
pub fn install_crash_reporter(reports_dir: PathBuf, backend: &'static str, context: Arc<CrashContext>) {
    let previous_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_default();

        let backtrace = std::backtrace::Backtrace::force_capture().to_string();
        let (keys, logs) = context.snapshot();

        let report = CrashReport::from_payload(backend, panic_info.payload(), &location, &backtrace)
            .with_metadata(keys)
            .with_logs(logs);

        if let Err(e) = save_crash_report(&reports_dir, &report) {
            eprintln!("Failed to save crash report: {e}");
        }

        previous_hook(panic_info);
    }));
}
