//! CrashLab Core - Domain types, configuration and ports
//!
//! This crate contains the pieces every other CrashLab crate agrees on:
//! - **Domain types** - fault groups and errors, telemetry flavors, telemetry metadata
//! - **Build planning** - target/flavor resolution and the `build.json` sidecar
//! - **Configuration** - typed YAML configuration with validation
//! - **Port definitions** - `ITelemetryService`, `IKeyValueStore`
//! - **Prefs** - the durable key-value store used across process restarts
//!
//! # Architecture
//!
//! The fault catalog and the telemetry router live in adapter crates and only
//! meet through the ports defined here.

pub mod build;
pub mod config;
pub mod domain;
pub mod ports;
pub mod prefs;
