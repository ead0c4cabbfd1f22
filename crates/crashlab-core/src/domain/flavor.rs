//! Telemetry flavors
//!
//! A flavor names the single observability backend baked into a build. The
//! selection happens at compile time through mutually exclusive cargo
//! features; this type is the runtime vocabulary for it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::CrashlabError;

/// Telemetry backend selected for a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    /// Sentry SDK
    Sentry,
    /// Firebase Crashlytics style reporting
    Crashlytics,
    /// Unity Cloud Diagnostics style reporting
    #[serde(rename = "unity")]
    UnityDiagnostics,
    /// No backend, logs only
    None,
}

impl Flavor {
    /// All real (non-`None`) flavors in canonical order.
    pub const REAL: [Flavor; 3] = [Flavor::Sentry, Flavor::Crashlytics, Flavor::UnityDiagnostics];

    /// Key used on the command line and in the build sidecar.
    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Sentry => "sentry",
            Flavor::Crashlytics => "crashlytics",
            Flavor::UnityDiagnostics => "unity",
            Flavor::None => "none",
        }
    }

    /// Value reported in the `backend` metadata key.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Flavor::None => "unknown",
            other => other.as_str(),
        }
    }

    /// Cargo feature of `crashlab-telemetry` that compiles this backend in.
    pub fn cargo_feature(&self) -> Option<&'static str> {
        match self {
            Flavor::Sentry => Some("sentry"),
            Flavor::Crashlytics => Some("crashlytics"),
            Flavor::UnityDiagnostics => Some("unity-diagnostics"),
            Flavor::None => None,
        }
    }

    /// Lenient parse used by the build planner: unknown keys fall back to
    /// Unity diagnostics.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentry" => Flavor::Sentry,
            "crashlytics" => Flavor::Crashlytics,
            "none" => Flavor::None,
            _ => Flavor::UnityDiagnostics,
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Flavor {
    type Err = CrashlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentry" => Ok(Flavor::Sentry),
            "crashlytics" => Ok(Flavor::Crashlytics),
            "unity" | "unity-diagnostics" => Ok(Flavor::UnityDiagnostics),
            "none" => Ok(Flavor::None),
            other => Err(CrashlabError::UnknownFlavor(other.to_string())),
        }
    }
}
