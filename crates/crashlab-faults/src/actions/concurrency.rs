//! Faults raised off the calling thread
//!
//! None of these propagate to the caller: the failing task or thread dies on
//! its own and only the panic hook (and with it the telemetry backend) sees
//! the fault.

use std::time::Duration;

use crashlab_core::domain::FaultError;
use tokio::runtime::{Builder, Handle};
use tracing::warn;

use super::OrRaise;
use crate::catalog::FaultArgs;
use crate::context::FaultContext;

/// Time given to a temporary runtime to run a detached task.
const DETACHED_TASK_GRACE: Duration = Duration::from_millis(50);

/// Time a temporary runtime waits for its blocking pool on shutdown.
const BLOCKING_POOL_GRACE: Duration = Duration::from_secs(1);

fn temporary_runtime() -> tokio::runtime::Runtime {
    Builder::new_current_thread()
        .enable_time()
        .build()
        .or_raise()
}

/// Spawns an async task that fails; its handle is dropped unobserved.
pub(crate) fn unobserved_task(_ctx: &FaultContext, _args: &FaultArgs) {
    let task = async {
        FaultError::Unhandled("CrashLab: unobserved task exception".to_string()).raise();
    };

    match Handle::try_current() {
        Ok(handle) => drop(handle.spawn(task)),
        Err(_) => {
            let runtime = temporary_runtime();
            drop(runtime.spawn(task));
            runtime.block_on(tokio::time::sleep(DETACHED_TASK_GRACE));
        }
    }
}

/// Starts a detached thread that fails with no handler on its stack.
pub(crate) fn background_thread(_ctx: &FaultContext, _args: &FaultArgs) {
    std::thread::Builder::new()
        .name("crashlab-background".to_string())
        .spawn(|| {
            FaultError::Unhandled("CrashLab: background thread exception".to_string()).raise()
        })
        .or_raise();
}

/// Queues a failing job on the blocking pool and drops its handle.
pub(crate) fn threadpool(_ctx: &FaultContext, _args: &FaultArgs) {
    let job = || {
        FaultError::Unhandled("CrashLab: threadpool unhandled exception".to_string()).raise()
    };

    match Handle::try_current() {
        Ok(handle) => drop(handle.spawn_blocking(job)),
        Err(_) => {
            let runtime = temporary_runtime();
            drop(runtime.spawn_blocking(job));
            runtime.shutdown_timeout(BLOCKING_POOL_GRACE);
        }
    }
}

/// Blocks the caller on an async delay.
pub(crate) fn sync_wait(duration: Duration) {
    // A runtime cannot be blocked on from inside another runtime's thread, so
    // the wait always happens on a dedicated thread.
    let waiter = std::thread::Builder::new()
        .name("crashlab-sync-wait".to_string())
        .spawn(move || -> Result<(), std::io::Error> {
            let runtime = Builder::new_current_thread().enable_time().build()?;
            runtime.block_on(tokio::time::sleep(duration));
            Ok(())
        })
        .or_raise();

    match waiter.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("sync_wait_hang: runtime unavailable: {e}"),
        Err(_) => warn!("sync_wait_hang: waiter thread panicked"),
    }
}
