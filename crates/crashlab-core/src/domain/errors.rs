//! Harness-internal error types
//!
//! These cover configuration, prefs persistence and build planning. They are
//! never used for the deliberate faults the catalog produces; see
//! [`FaultError`](super::fault::FaultError) for those.

use thiserror::Error;

/// Errors raised by CrashLab's own plumbing
#[derive(Debug, Error)]
pub enum CrashlabError {
    /// Filesystem failure while reading or writing harness state
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization failure
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Target platform key not recognized by the build planner
    #[error("Unsupported target: {0}")]
    UnknownTarget(String),

    /// Telemetry flavor key not recognized
    #[error("Unknown telemetry flavor: {0}")]
    UnknownFlavor(String),

    /// Flavor exists but is not available on the requested target
    #[error("Flavor {flavor} is not supported on target {target}")]
    UnsupportedFlavor {
        /// The target platform key
        target: String,
        /// The requested flavor key
        flavor: String,
    },

    /// A configuration key that is not part of the typed option set
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    /// A configuration value that failed to parse
    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidOption {
        /// The offending key
        key: String,
        /// The raw value
        value: String,
        /// Human-readable description of the expected type
        expected: &'static str,
    },
}
