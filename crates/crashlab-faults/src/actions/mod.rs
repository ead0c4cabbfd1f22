//! Fault procedures
//!
//! Each procedure runs after the catalog has logged the action's START
//! marker. Recoverable faults are raised as [`FaultError`] panics and never
//! caught here.

pub(crate) mod concurrency;
pub(crate) mod hang;
pub(crate) mod io;
pub(crate) mod managed;
pub(crate) mod memory;
pub(crate) mod native;

use crashlab_core::domain::FaultError;

pub use io::DisposableBuffer;
pub use memory::{grow_heap, HeapPlan};

/// Unwraps a result or raises its error as a fault.
pub(crate) trait OrRaise<T> {
    fn or_raise(self) -> T;
}

impl<T, E: Into<FaultError>> OrRaise<T> for Result<T, E> {
    fn or_raise(self) -> T {
        match self {
            Ok(value) => value,
            Err(e) => e.into().raise(),
        }
    }
}
