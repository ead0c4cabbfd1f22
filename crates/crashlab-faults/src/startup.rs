//! Startup trampoline
//!
//! Lets a run schedule an action for the *next* launch, so faults that only
//! matter early in process life can be exercised. The pending key is removed
//! and flushed before the action runs: a scheduled crash fires exactly once.

use crashlab_core::domain::MARKER_NAMESPACE;
use crashlab_core::ports::IKeyValueStore;
use tracing::{info, warn};

use crate::catalog::{self, FaultArgs};
use crate::context::FaultContext;

/// Prefs key holding the action to run on next start.
pub const STARTUP_ACTION_KEY: &str = "crashlab_startup_action";

/// Action scheduled by `schedule_startup_crash`.
pub const DEFAULT_STARTUP_ACTION: &str = "native_abort";

/// What [`check_and_run`] found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupCheck {
    /// Nothing scheduled
    None,
    /// A key was scheduled but names no catalog action
    Unknown(String),
    /// The named action ran and returned
    Invoked(String),
}

/// Stores `action` under `key` and flushes the store.
///
/// A failed flush is logged; the value stays pending in memory.
pub fn schedule(store: &dyn IKeyValueStore, key: &str, action: &str) {
    store.set(key, action);
    if let Err(e) = store.save() {
        warn!("Failed to persist startup action '{action}': {e}");
    }
}

/// Removes and returns the scheduled action, flushing the removal first.
pub fn take_scheduled(store: &dyn IKeyValueStore, key: &str) -> Option<String> {
    let action = store.get(key)?;
    store.delete(key);
    if let Err(e) = store.save() {
        warn!("Failed to clear startup action '{action}': {e}");
    }
    Some(action)
}

/// Runs the action scheduled under `key`, if any.
///
/// The key is gone from the store before the action starts, whether the
/// action then returns, unwinds, or kills the process.
pub fn check_and_run(ctx: &FaultContext, key: &str) -> StartupCheck {
    let Some(action) = take_scheduled(ctx.store(), key) else {
        return StartupCheck::None;
    };

    let Some(entry) = catalog::find(action.trim()) else {
        warn!("{MARKER_NAMESPACE}::startup_crash::UNKNOWN::{action}");
        return StartupCheck::Unknown(action);
    };

    info!("{MARKER_NAMESPACE}::startup_crash::RUN::{}", entry.key);
    entry.invoke(ctx, &FaultArgs::default());
    StartupCheck::Invoked(entry.key.to_string())
}

/// Catalog procedure for `schedule_startup_crash`.
pub(crate) fn schedule_startup_crash(ctx: &FaultContext, _args: &FaultArgs) {
    schedule(ctx.store(), STARTUP_ACTION_KEY, DEFAULT_STARTUP_ACTION);
    info!("{MARKER_NAMESPACE}::startup_crash::SCHEDULED");
}
