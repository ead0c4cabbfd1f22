//! Host information attached to crash reports
//!
//! Only coarse, non-identifying facts are collected. The machine name is
//! already part of the telemetry metadata (`server_name`) and is not
//! repeated here.

use serde::{Deserialize, Serialize};

/// Operating system and hardware summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub os: String,
    pub family: String,
    pub kernel: String,
    pub arch: String,
    pub cpus: usize,
}

impl OsInfo {
    /// Collect information about the running host.
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            family: std::env::consts::FAMILY.to_string(),
            kernel: kernel_release(),
            arch: std::env::consts::ARCH.to_string(),
            cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

#[cfg(target_os = "linux")]
fn kernel_release() -> String {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

#[cfg(not(target_os = "linux"))]
fn kernel_release() -> String {
    String::new()
}
