//! Process-terminating native faults

use std::hint::black_box;

use tracing::warn;

use super::OrRaise;
use crate::catalog::FaultArgs;
use crate::context::FaultContext;

pub(crate) fn access_violation(ctx: &FaultContext, _args: &FaultArgs) {
    ctx.telemetry().record_native_crash("native_av", "segfault");
    ctx.native().segfault()
}

pub(crate) fn abort(ctx: &FaultContext, _args: &FaultArgs) {
    ctx.telemetry().record_native_crash("native_abort", "abort");
    ctx.native().abort()
}

pub(crate) fn fatal(ctx: &FaultContext, _args: &FaultArgs) {
    ctx.telemetry().record_native_crash("native_fatal", "illegal_instruction");
    ctx.native().illegal_instruction()
}

/// Recurses without bound on a thread with a deliberately small stack.
///
/// The runtime's guard page turns the overflow into a fatal signal; the
/// calling thread waits on the join and never returns.
pub(crate) fn stack_overflow(ctx: &FaultContext, _args: &FaultArgs) {
    let stack_size = ctx.faults().stack_overflow_stack_kb * 1024;
    // The overflow kills the process from the worker's guard page.
    ctx.telemetry()
        .record_native_crash("native_stack_overflow", "stack_overflow");
    let worker = std::thread::Builder::new()
        .name("CrashLabStackOverflow".to_string())
        .stack_size(stack_size)
        .spawn(|| recurse(0))
        .or_raise();

    if worker.join().is_err() {
        warn!("native_stack_overflow: worker unwound instead of overflowing");
    }
}

#[inline(never)]
#[allow(unconditional_recursion)]
fn recurse(depth: u64) -> u64 {
    let frame = black_box([depth; 32]);
    // Non-tail call keeps every frame alive.
    recurse(depth + 1).wrapping_add(frame[0])
}
