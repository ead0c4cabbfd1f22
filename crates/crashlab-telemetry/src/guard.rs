//! Panic isolation for backend calls

use std::panic::{self, AssertUnwindSafe};

use crashlab_core::domain::panic_message;
use tracing::warn;

/// Runs `f`, turning a panic into a warning. Returns `None` if `f` panicked.
pub(crate) fn best_effort<R>(backend: &str, operation: &str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            warn!(
                "Telemetry backend {backend} failed in {operation}: {}",
                panic_message(payload.as_ref())
            );
            None
        }
    }
}
