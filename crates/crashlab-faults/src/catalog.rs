//! The fault catalog
//!
//! A static, ordered list of every deliberate fault the harness can trigger.
//! The order is the presentation order; it never changes at runtime.

use serde::Serialize;
use tracing::info;

use crashlab_core::domain::{start_marker, FaultGroup};
use FaultGroup::{Crash, Error};

use crate::actions::{concurrency, hang, io, managed, memory, native};
use crate::context::FaultContext;
use crate::startup;

/// Optional parameters of an invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultArgs {
    /// Hang length; the configured default (10 s) when absent
    pub seconds: Option<u64>,
}

impl FaultArgs {
    pub fn with_seconds(seconds: u64) -> Self {
        Self {
            seconds: Some(seconds),
        }
    }
}

/// Procedure run after the START marker
pub type FaultProcedure = fn(&FaultContext, &FaultArgs);

/// One catalog entry
#[derive(Clone, Copy, Serialize)]
pub struct FaultAction {
    /// Stable identifier used by the CLI, deep links and the startup trampoline
    pub key: &'static str,
    /// Human label
    pub label: &'static str,
    pub group: FaultGroup,
    /// Accepts a `seconds` parameter
    pub takes_seconds: bool,
    #[serde(skip)]
    procedure: FaultProcedure,
}

impl std::fmt::Debug for FaultAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultAction")
            .field("key", &self.key)
            .field("group", &self.group)
            .finish()
    }
}

impl FaultAction {
    const fn new(
        key: &'static str,
        label: &'static str,
        group: FaultGroup,
        procedure: FaultProcedure,
    ) -> Self {
        Self {
            key,
            label,
            group,
            takes_seconds: false,
            procedure,
        }
    }

    const fn hang(key: &'static str, label: &'static str, procedure: FaultProcedure) -> Self {
        Self {
            key,
            label,
            group: FaultGroup::Error,
            takes_seconds: true,
            procedure,
        }
    }

    /// Logs the START marker, then runs the procedure.
    ///
    /// Recoverable faults unwind out of this call; crash-class faults do not
    /// return at all.
    pub fn invoke(&self, ctx: &FaultContext, args: &FaultArgs) {
        info!("{}", start_marker(self.key));
        (self.procedure)(ctx, args);
    }
}

static CATALOG: &[FaultAction] = &[
    FaultAction::new("managed_null_ref", "Null reference", Error, managed::null_ref),
    FaultAction::new("managed_div_zero", "Divide by zero", Error, managed::div_zero),
    FaultAction::new("managed_unhandled", "Unhandled exception", Error, managed::unhandled),
    FaultAction::new(
        "managed_index_out_of_range",
        "Index out of range",
        Error,
        managed::index_out_of_range,
    ),
    FaultAction::new("managed_key_not_found", "Key not found", Error, managed::key_not_found),
    FaultAction::new(
        "managed_invalid_operation",
        "Collection modified during enumeration",
        Error,
        managed::invalid_operation,
    ),
    FaultAction::new("managed_aggregate", "Aggregate of task failures", Error, managed::aggregate),
    FaultAction::new(
        "managed_unobserved_task",
        "Unobserved task failure",
        Error,
        concurrency::unobserved_task,
    ),
    FaultAction::new(
        "background_thread_unhandled",
        "Background thread failure",
        Error,
        concurrency::background_thread,
    ),
    FaultAction::new(
        "threadpool_unhandled",
        "Blocking pool failure",
        Error,
        concurrency::threadpool,
    ),
    FaultAction::new("native_av", "Native access violation", Crash, native::access_violation),
    FaultAction::new("native_abort", "Native abort", Crash, native::abort),
    FaultAction::new("native_fatal", "Native illegal instruction", Crash, native::fatal),
    FaultAction::new(
        "native_stack_overflow",
        "Native stack overflow",
        Crash,
        native::stack_overflow,
    ),
    FaultAction::hang("android_anr", "Android ANR", hang::android_anr),
    FaultAction::hang("desktop_hang", "Desktop hang", hang::desktop_hang),
    FaultAction::hang("sync_wait_hang", "Synchronous wait on async delay", hang::sync_wait_hang),
    FaultAction::new("oom_heap", "Heap out of memory", Crash, memory::oom_heap),
    FaultAction::new(
        "asset_bundle_flood",
        "Asset bundle flood",
        Crash,
        memory::asset_bundle_flood,
    ),
    FaultAction::new(
        "asset_bundle_flood_single",
        "Asset bundle flood (single pass)",
        Error,
        memory::asset_bundle_flood_single,
    ),
    FaultAction::new("file_write_denied", "File write denied", Error, io::file_write_denied),
    FaultAction::new("json_parse_error", "Date parse error", Error, io::json_parse_error),
    FaultAction::new("use_after_dispose", "Use after dispose", Error, io::use_after_dispose),
    FaultAction::new(
        "schedule_startup_crash",
        "Schedule crash on next launch",
        Crash,
        startup::schedule_startup_crash,
    ),
];

/// Every action in presentation order.
pub fn actions() -> &'static [FaultAction] {
    CATALOG
}

/// Looks up an action by exact key.
pub fn find(key: &str) -> Option<&'static FaultAction> {
    CATALOG.iter().find(|a| a.key == key)
}

/// Actions of one group, in catalog order.
pub fn by_group(group: FaultGroup) -> impl Iterator<Item = &'static FaultAction> {
    CATALOG.iter().filter(move |a| a.group == group)
}
