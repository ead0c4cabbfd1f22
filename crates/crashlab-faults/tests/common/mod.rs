//! Shared fixtures for fault catalog integration tests

#![allow(dead_code)]

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crashlab_core::config::Config;
use crashlab_core::domain::{FaultError, TelemetryMetadata};
use crashlab_core::ports::{Breadcrumb, ITelemetryService, LogLevel};
use crashlab_core::prefs::MemoryKeyValueStore;
use crashlab_faults::{FaultContext, HangProvider, NativeFaultProvider};

// ============================================================================
// Log capture
// ============================================================================

/// Log lines recorded while a closure ran
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<(Level, String)>>>);

impl Captured {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn at(&self, level: Level) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Number of lines exactly equal to `line`.
    pub fn count(&self, line: &str) -> usize {
        self.lines().iter().filter(|l| l.as_str() == line).count()
    }

    /// Number of lines starting with `prefix`.
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.lines().iter().filter(|l| l.starts_with(prefix)).count()
    }

    pub fn last(&self) -> Option<String> {
        self.lines().last().cloned()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

struct CaptureLayer(Captured);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
             .0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

/// Runs `f` with a thread-local subscriber that records every event.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Captured) {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer(captured.clone()));
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, captured)
}

/// Runs `f` under capture, catching any unwind.
pub fn capture_unwind<F: FnOnce()>(f: F) -> (Result<(), Box<dyn Any + Send>>, Captured) {
    capture(|| catch_unwind(AssertUnwindSafe(f)))
}

/// Kind of the [`FaultError`] carried by a panic payload.
pub fn fault_kind(payload: &(dyn Any + Send)) -> Option<&'static str> {
    FaultError::from_payload(payload).map(FaultError::kind)
}

/// Message of a `panic!` payload.
pub fn panic_text(payload: &(dyn Any + Send)) -> String {
    crashlab_core::domain::panic_message(payload)
}

// ============================================================================
// Fakes
// ============================================================================

/// Telemetry backend that records breadcrumbs
#[derive(Default)]
pub struct RecordingTelemetry {
    pub breadcrumbs: Mutex<Vec<Breadcrumb>>,
    pub native_crashes: Mutex<Vec<(String, String)>>,
}

impl RecordingTelemetry {
    pub fn messages(&self) -> Vec<String> {
        self.breadcrumbs
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.message.clone())
            .collect()
    }
}

impl ITelemetryService for RecordingTelemetry {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn initialize(&self, _: &str, _: &TelemetryMetadata, _: &str, _: &str) {}

    fn on_log(&self, _: &str, _: Option<&str>, _: LogLevel) {}

    fn ensure_session(&self, _: Option<&str>) {}

    fn add_breadcrumb(&self, breadcrumb: &Breadcrumb) {
        self.breadcrumbs.lock().unwrap().push(breadcrumb.clone());
    }

    fn record_native_crash(&self, action: &str, fault: &str) {
        self.native_crashes
            .lock()
            .unwrap()
            .push((action.to_string(), fault.to_string()));
    }
}

/// Native provider that unwinds with a sentinel instead of killing the process
pub struct FakeNative;

impl NativeFaultProvider for FakeNative {
    fn segfault(&self) -> ! {
        panic!("native:segfault")
    }

    fn abort(&self) -> ! {
        panic!("native:abort")
    }

    fn illegal_instruction(&self) -> ! {
        panic!("native:illegal_instruction")
    }
}

/// Hang provider that records requested durations without sleeping
#[derive(Default)]
pub struct RecordingHang {
    pub blocks: Mutex<Vec<Duration>>,
    pub anrs: Mutex<Vec<Duration>>,
}

impl HangProvider for RecordingHang {
    fn block(&self, duration: Duration) {
        self.blocks.lock().unwrap().push(duration);
    }

    fn anr(&self, duration: Duration) {
        self.anrs.lock().unwrap().push(duration);
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub ctx: FaultContext,
    pub store: Arc<MemoryKeyValueStore>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub hang: Arc<RecordingHang>,
}

/// A fault context with fake providers and in-memory prefs.
pub fn harness(config: &Config) -> Harness {
    let store = Arc::new(MemoryKeyValueStore::new());
    let telemetry = Arc::new(RecordingTelemetry::default());
    let hang = Arc::new(RecordingHang::default());

    let ctx = FaultContext::new(config, store.clone(), telemetry.clone())
        .with_native_provider(Arc::new(FakeNative))
        .with_hang_provider(hang.clone());

    Harness {
        ctx,
        store,
        telemetry,
        hang,
    }
}
