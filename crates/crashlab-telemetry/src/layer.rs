//! Log mirroring
//!
//! [`TelemetryLayer`] forwards every `tracing` event to the telemetry
//! service's `on_log`, the way an engine forwards its log callback to the
//! crash reporter. Events emitted while a forward is already in progress on
//! the same thread (a backend logging a warning, for instance) are not
//! mirrored again.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crashlab_core::ports::{ITelemetryService, LogLevel};

/// Event field carrying an optional stack trace.
pub const STACK_TRACE_FIELD: &str = "stack_trace";

thread_local! {
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

/// `tracing_subscriber` layer mirroring log events into a telemetry service
pub struct TelemetryLayer {
    service: Arc<dyn ITelemetryService>,
}

impl TelemetryLayer {
    pub fn new(service: Arc<dyn ITelemetryService>) -> Self {
        Self { service }
    }
}

#[derive(Default)]
struct LogVisitor {
    message: String,
    stack_trace: Option<String>,
}

impl Visit for LogVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            STACK_TRACE_FIELD => self.stack_trace = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            STACK_TRACE_FIELD => self.stack_trace = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

/// Resets the re-entrancy flag even if the backend unwinds.
struct ForwardingGuard;

impl Drop for ForwardingGuard {
    fn drop(&mut self) {
        FORWARDING.with(|f| f.set(false));
    }
}

impl<S: Subscriber> Layer<S> for TelemetryLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if FORWARDING.with(|f| f.replace(true)) {
            return;
        }
        let _guard = ForwardingGuard;

        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);
        let level = LogLevel::from(event.metadata().level());
        self.service
            .on_log(&visitor.message, visitor.stack_trace.as_deref(), level);
    }
}
