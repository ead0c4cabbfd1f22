//! Platform capability providers
//!
//! Native faults and hangs are the only catalog behaviors that depend on the
//! platform. They sit behind two small traits so the catalog stays portable
//! and tests can substitute recording fakes for process-terminating calls.

use std::time::Duration;

use tracing::warn;

/// Terminates the process with a native fault
pub trait NativeFaultProvider: Send + Sync {
    /// Invalid memory access (SIGSEGV / access violation).
    fn segfault(&self) -> !;

    /// Abnormal termination (SIGABRT).
    fn abort(&self) -> !;

    /// Illegal instruction (SIGILL).
    fn illegal_instruction(&self) -> !;
}

/// Blocks the calling thread
pub trait HangProvider: Send + Sync {
    /// Blocks for `duration` on any platform.
    fn block(&self, duration: Duration);

    /// Blocks long enough to trip the Android "not responding" watchdog.
    /// Log-only on other platforms.
    fn anr(&self, duration: Duration);
}

/// Raises real signals with `libc::raise`
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalFaultProvider;

#[cfg(unix)]
impl SignalFaultProvider {
    fn raise(signal: libc::c_int) -> ! {
        // SAFETY: raise() is async-signal-safe and has no memory preconditions.
        unsafe {
            libc::signal(signal, libc::SIG_DFL);
            libc::raise(signal);
        }
        // Only reached if the signal was blocked or ignored.
        std::process::abort()
    }
}

#[cfg(unix)]
impl NativeFaultProvider for SignalFaultProvider {
    fn segfault(&self) -> ! {
        Self::raise(libc::SIGSEGV)
    }

    fn abort(&self) -> ! {
        Self::raise(libc::SIGABRT)
    }

    fn illegal_instruction(&self) -> ! {
        Self::raise(libc::SIGILL)
    }
}

/// Fallback for platforms without POSIX signals: every native fault is a
/// process abort.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortFaultProvider;

impl NativeFaultProvider for AbortFaultProvider {
    fn segfault(&self) -> ! {
        std::process::abort()
    }

    fn abort(&self) -> ! {
        std::process::abort()
    }

    fn illegal_instruction(&self) -> ! {
        std::process::abort()
    }
}

/// Native fault provider for the current target.
#[cfg(unix)]
pub fn platform_native_provider() -> std::sync::Arc<dyn NativeFaultProvider> {
    std::sync::Arc::new(SignalFaultProvider)
}

/// Native fault provider for the current target.
#[cfg(not(unix))]
pub fn platform_native_provider() -> std::sync::Arc<dyn NativeFaultProvider> {
    std::sync::Arc::new(AbortFaultProvider)
}

/// `std::thread::sleep` based hangs
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleepHang;

impl HangProvider for ThreadSleepHang {
    fn block(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "android")]
    fn anr(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    #[cfg(not(target_os = "android"))]
    fn anr(&self, duration: Duration) {
        tracing::info!(
            seconds = duration.as_secs(),
            "android_anr requested on non-Android platform"
        );
    }
}

/// Converts a requested hang length, warning about zero-length hangs.
pub(crate) fn hang_duration(seconds: u64) -> Duration {
    if seconds == 0 {
        warn!("Hang requested with 0 seconds; returning immediately");
    }
    Duration::from_secs(seconds)
}
