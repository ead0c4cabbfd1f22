//! Domain entities
//!
//! - Fault groups, the deliberate-fault error taxonomy and log markers
//! - Telemetry flavors (the backend baked into a build)
//! - Telemetry metadata resolved at process start
//! - Harness-internal error types

pub mod errors;
pub mod fault;
pub mod flavor;
pub mod metadata;

pub use errors::CrashlabError;
pub use fault::{panic_message, start_marker, FaultError, FaultGroup, MARKER_NAMESPACE};
pub use flavor::Flavor;
pub use metadata::{MetadataUpdate, TelemetryMetadata};
