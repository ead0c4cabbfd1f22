//! Port definitions
//!
//! Interfaces the fault catalog and the CLI depend on, implemented in
//! adapter crates (telemetry backends) or in [`crate::prefs`].
//!
//! ## Ports Overview
//!
//! - [`ITelemetryService`] - the single seam to the compiled observability backend
//! - [`IKeyValueStore`] - durable key-value storage that survives restarts

pub mod key_value_store;
pub mod telemetry_service;

pub use key_value_store::IKeyValueStore;
pub use telemetry_service::{Breadcrumb, BreadcrumbLevel, ITelemetryService, LogLevel};
