//! Fault taxonomy
//!
//! Fault actions surface their failure as a panic whose payload is a
//! [`FaultError`]. The panic travels to the topmost handler exactly like an
//! uncaught exception would, and observers (panic hooks, telemetry backends,
//! tests using `catch_unwind`) can downcast the payload to learn which kind
//! of fault was produced.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of every log marker emitted by the harness.
pub const MARKER_NAMESPACE: &str = "CRASHLAB";

/// Builds the `CRASHLAB::<action_key>::START` marker logged before an action runs.
pub fn start_marker(action_key: &str) -> String {
    format!("{MARKER_NAMESPACE}::{action_key}::START")
}

/// Presentation group of a fault action
///
/// The group drives how actions are listed; it has no effect on what an
/// action does when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultGroup {
    /// Expected to terminate the process almost immediately
    Crash,
    /// Expected to produce a recoverable error, a hang, or a degraded state
    Error,
}

impl fmt::Display for FaultGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultGroup::Crash => "Crash",
            FaultGroup::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

/// A deliberately produced fault
#[derive(Debug, Error)]
pub enum FaultError {
    /// Member access on an absent value
    #[error("Object reference not set to an instance of an object: {0}")]
    NullReference(String),

    /// Integer division by zero
    #[error("Attempted to divide by zero")]
    DivideByZero,

    /// Generic error nobody handles
    #[error("{0}")]
    Unhandled(String),

    /// Index outside the bounds of a collection
    #[error("Index {index} was outside the bounds of the array (length {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Collection length
        len: usize,
    },

    /// Missing dictionary key
    #[error("The given key '{0}' was not present in the dictionary")]
    KeyNotFound(String),

    /// Collection mutated while being enumerated
    #[error("Collection was modified; {0}")]
    ConcurrentModification(String),

    /// Operation invalid for the current state
    #[error("Operation is not valid: {0}")]
    InvalidOperation(String),

    /// Argument rejected by the callee
    #[error("Value does not fall within the expected range: {0}")]
    InvalidArgument(String),

    /// Several concurrent failures flattened into one
    #[error("One or more errors occurred ({} inner)", .0.len())]
    Aggregate(Vec<FaultError>),

    /// Filesystem access failure (permission denied and friends)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Strict parser rejected its input
    #[error("String was not recognized as a valid date: {0}")]
    Parse(#[from] chrono::ParseError),

    /// Use of a resource after it was released
    #[error("Cannot access a disposed object: {0}")]
    Disposed(String),

    /// Allocation failure
    #[error("Out of memory: failed to allocate {requested} bytes after {total} bytes")]
    OutOfMemory {
        /// Size of the allocation that failed
        requested: u64,
        /// Bytes successfully allocated before the failure
        total: u64,
    },
}

impl FaultError {
    /// Short, stable name of the fault kind used in reports and markers.
    pub fn kind(&self) -> &'static str {
        match self {
            FaultError::NullReference(_) => "NullReference",
            FaultError::DivideByZero => "DivideByZero",
            FaultError::Unhandled(_) => "Unhandled",
            FaultError::IndexOutOfRange { .. } => "IndexOutOfRange",
            FaultError::KeyNotFound(_) => "KeyNotFound",
            FaultError::ConcurrentModification(_) => "ConcurrentModification",
            FaultError::InvalidOperation(_) => "InvalidOperation",
            FaultError::InvalidArgument(_) => "InvalidArgument",
            FaultError::Aggregate(_) => "Aggregate",
            FaultError::Io(_) => "Io",
            FaultError::Parse(_) => "Parse",
            FaultError::Disposed(_) => "Disposed",
            FaultError::OutOfMemory { .. } => "OutOfMemory",
        }
    }

    /// Raises this fault as an unwinding panic carrying `self` as payload.
    pub fn raise(self) -> ! {
        std::panic::panic_any(self)
    }

    /// Extracts a fault from a panic payload, if the panic carried one.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Option<&FaultError> {
        payload.downcast_ref::<FaultError>()
    }
}

/// Renders any panic payload as a message.
///
/// Understands [`FaultError`] payloads as well as the `&str`/`String`
/// payloads produced by `panic!`.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(fault) = FaultError::from_payload(payload) {
        format!("{}: {}", fault.kind(), fault)
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
