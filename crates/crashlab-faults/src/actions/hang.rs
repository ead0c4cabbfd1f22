//! Hangs. None of them can be cancelled.

use crashlab_core::domain::MARKER_NAMESPACE;
use tracing::info;

use super::concurrency::sync_wait;
use crate::catalog::FaultArgs;
use crate::context::FaultContext;
use crate::providers::hang_duration;

fn seconds(ctx: &FaultContext, args: &FaultArgs) -> u64 {
    args.seconds.unwrap_or(ctx.faults().hang_seconds)
}

fn log_block(key: &str, seconds: u64) {
    info!("{MARKER_NAMESPACE}::{key}::BLOCK::{seconds}s");
}

pub(crate) fn android_anr(ctx: &FaultContext, args: &FaultArgs) {
    let seconds = seconds(ctx, args);
    log_block("android_anr", seconds);
    ctx.hang().anr(hang_duration(seconds));
}

pub(crate) fn desktop_hang(ctx: &FaultContext, args: &FaultArgs) {
    let seconds = seconds(ctx, args);
    log_block("desktop_hang", seconds);
    ctx.hang().block(hang_duration(seconds));
}

pub(crate) fn sync_wait_hang(ctx: &FaultContext, args: &FaultArgs) {
    let seconds = seconds(ctx, args);
    log_block("sync_wait_hang", seconds);
    sync_wait(hang_duration(seconds));
}
