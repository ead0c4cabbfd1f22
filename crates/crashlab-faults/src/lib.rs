//! CrashLab Faults - Deliberate fault injection
//!
//! Provides:
//! - The ordered fault catalog and its procedures
//! - Platform providers for native faults and hangs
//! - The asset flood runner
//! - The startup trampoline
//! - Deep-link and intent dispatch

pub mod actions;
pub mod catalog;
pub mod context;
pub mod dispatch;
pub mod flood;
pub mod providers;
pub mod startup;

pub use catalog::{actions as all_actions, find, FaultAction, FaultArgs};
pub use context::FaultContext;
pub use flood::{DirectoryResourceSource, FloodOutcome, FloodRunner, ResourceSource};
pub use providers::{HangProvider, NativeFaultProvider};
pub use startup::{check_and_run, schedule, StartupCheck, STARTUP_ACTION_KEY};
