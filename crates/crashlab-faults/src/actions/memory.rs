//! Memory exhaustion

use crashlab_core::domain::{FaultError, MARKER_NAMESPACE};
use tracing::info;

use crate::catalog::FaultArgs;
use crate::context::FaultContext;
use crate::flood::FloodOutcome;

const MIB: u64 = 1024 * 1024;

/// Fill byte written to every allocated block so pages are committed.
const FILL: u8 = 0xA5;

/// Allocation schedule for [`grow_heap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapPlan {
    /// First block size in bytes
    pub initial: u64,
    /// Largest single block in bytes
    pub max_block: u64,
    /// Optional total; exceeding it counts as an allocation failure
    pub limit: Option<u64>,
}

impl HeapPlan {
    pub fn from_megabytes(initial_mb: u64, max_block_mb: u64, limit_mb: Option<u64>) -> Self {
        Self {
            initial: initial_mb * MIB,
            max_block: max_block_mb * MIB,
            limit: limit_mb.map(|mb| mb * MIB),
        }
    }
}

/// Allocates doubling blocks until an allocation fails.
///
/// Every block stays alive until the failure; all of them are freed before
/// the resulting [`FaultError::OutOfMemory`] is returned. Running totals are
/// logged for the first four allocations and every fourth after that.
pub fn grow_heap(plan: HeapPlan) -> FaultError {
    let mut blocks: Vec<Vec<u8>> = Vec::new();
    let mut size = plan.initial.max(1);
    let mut total = 0u64;
    let mut allocations = 0u64;

    let failure = loop {
        let over_limit = plan
            .limit
            .is_some_and(|limit| total.saturating_add(size) > limit);
        let Some(len) = usize::try_from(size).ok().filter(|_| !over_limit) else {
            break FaultError::OutOfMemory {
                requested: size,
                total,
            };
        };

        let mut block = Vec::new();
        if block.try_reserve_exact(len).is_err() {
            break FaultError::OutOfMemory {
                requested: size,
                total,
            };
        }
        block.resize(len, FILL);
        blocks.push(block);
        allocations += 1;
        total += size;

        if allocations <= 4 || allocations % 4 == 0 {
            info!(
                "{MARKER_NAMESPACE}::oom_heap::ALLOC::{}MB::TOTAL::{}MB",
                size / MIB,
                total / MIB
            );
        }

        if size < plan.max_block {
            size = (size * 2).min(plan.max_block);
        }
    };

    drop(blocks);
    failure
}

pub(crate) fn oom_heap(ctx: &FaultContext, _args: &FaultArgs) {
    let faults = ctx.faults();
    let plan = HeapPlan::from_megabytes(
        faults.heap_initial_mb,
        faults.heap_max_block_mb,
        faults.heap_limit_mb,
    );
    grow_heap(plan).raise()
}

pub(crate) fn asset_bundle_flood(ctx: &FaultContext, _args: &FaultArgs) {
    log_outcome(ctx.flood().run(true));
}

pub(crate) fn asset_bundle_flood_single(ctx: &FaultContext, _args: &FaultArgs) {
    log_outcome(ctx.flood().run(false));
}

fn log_outcome(outcome: FloodOutcome) {
    tracing::debug!(?outcome, "Asset flood returned");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_heap_respects_limit() {
        let plan = HeapPlan {
            initial: 1024,
            max_block: 2048,
            limit: Some(5 * 1024),
        };
        // 1 KiB + 2 KiB + 2 KiB = 5 KiB, the next 2 KiB block exceeds the limit
        let fault = grow_heap(plan);
        assert!(matches!(
            fault,
            FaultError::OutOfMemory {
                requested: 2048,
                total: 5120
            }
        ));
    }

    #[test]
    fn test_from_megabytes() {
        let plan = HeapPlan::from_megabytes(64, 512, Some(1024));
        assert_eq!(plan.initial, 64 * MIB);
        assert_eq!(plan.max_block, 512 * MIB);
        assert_eq!(plan.limit, Some(1024 * MIB));
    }
}
