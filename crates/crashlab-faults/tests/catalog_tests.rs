//! Integration tests for the fault catalog
//!
//! Crash-class actions run against fake providers here; the real signal
//! paths are covered by the CLI's child-process tests.

mod common;

use std::time::Duration;

use tracing::Level;

use crashlab_core::config::{Config, ConfigBuilder};
use crashlab_core::domain::{start_marker, FaultError};
use crashlab_faults::catalog::{self, FaultArgs};

use common::{capture_unwind, fault_kind, harness, panic_text};

// ============================================================================
// Test helpers
// ============================================================================

/// Invokes `key` and returns the fault kind it raised.
fn raised_kind(config: &Config, key: &str) -> Option<&'static str> {
    let h = harness(config);
    let action = catalog::find(key).expect("known action");
    let (result, captured) = capture_unwind(|| action.invoke(&h.ctx, &FaultArgs::default()));
    assert_eq!(captured.count(&start_marker(key)), 1, "START for {key}");
    let payload = result.expect_err("action should raise");
    fault_kind(payload.as_ref())
}

// ============================================================================
// Recoverable faults
// ============================================================================

#[test]
fn test_managed_faults_raise_typed_errors() {
    let config = Config::default();
    let cases = [
        ("managed_null_ref", "NullReference"),
        ("managed_div_zero", "DivideByZero"),
        ("managed_unhandled", "Unhandled"),
        ("managed_index_out_of_range", "IndexOutOfRange"),
        ("managed_key_not_found", "KeyNotFound"),
        ("managed_invalid_operation", "ConcurrentModification"),
        ("managed_aggregate", "Aggregate"),
        ("json_parse_error", "Parse"),
        ("use_after_dispose", "Disposed"),
    ];
    for (key, kind) in cases {
        assert_eq!(raised_kind(&config, key), Some(kind), "{key}");
    }
}

#[test]
fn test_divide_by_zero_produces_no_result() {
    let h = harness(&Config::default());
    let (result, captured) = capture_unwind(|| {
        catalog::find("managed_div_zero")
            .unwrap()
            .invoke(&h.ctx, &FaultArgs::default())
    });
    assert!(result.is_err());
    assert_eq!(captured.count_prefix("Division produced a result"), 0);
}

#[test]
fn test_unhandled_message() {
    let h = harness(&Config::default());
    let (result, _) = capture_unwind(|| {
        catalog::find("managed_unhandled")
            .unwrap()
            .invoke(&h.ctx, &FaultArgs::default())
    });
    let payload = result.unwrap_err();
    let fault = FaultError::from_payload(payload.as_ref()).unwrap();
    assert_eq!(fault.to_string(), "CrashLab: unhandled exception");
}

#[test]
fn test_aggregate_flattens_both_failures() {
    let h = harness(&Config::default());
    let (result, _) = capture_unwind(|| {
        catalog::find("managed_aggregate")
            .unwrap()
            .invoke(&h.ctx, &FaultArgs::default())
    });
    let payload = result.unwrap_err();
    match FaultError::from_payload(payload.as_ref()) {
        Some(FaultError::Aggregate(inner)) => {
            let mut kinds: Vec<&str> = inner.iter().map(FaultError::kind).collect();
            kinds.sort_unstable();
            assert_eq!(kinds, vec!["InvalidArgument", "InvalidOperation"]);
        }
        other => panic!("expected aggregate, got {other:?}"),
    }
}

#[test]
fn test_file_write_denied_raises_io() {
    let tmp = tempfile::tempdir().unwrap();
    // Writing to a directory path fails even with elevated privileges.
    let config = ConfigBuilder::new()
        .denied_path(tmp.path().to_path_buf())
        .build();
    assert_eq!(raised_kind(&config, "file_write_denied"), Some("Io"));
}

#[cfg(unix)]
#[test]
fn test_default_denied_path_is_permission_denied() {
    if unsafe { libc::geteuid() } == 0 {
        return;
    }
    let h = harness(&Config::default());
    let action = catalog::find("file_write_denied").unwrap();
    let (result, _) = capture_unwind(|| action.invoke(&h.ctx, &FaultArgs::default()));
    let payload = result.expect_err("protected write should fail");
    match FaultError::from_payload(payload.as_ref()) {
        Some(FaultError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
        other => panic!("expected Io fault, got {other:?}"),
    }
}

// ============================================================================
// Faults that leave the caller running
// ============================================================================

#[test]
fn test_detached_failures_return_to_caller() {
    let h = harness(&Config::default());
    for key in [
        "background_thread_unhandled",
        "threadpool_unhandled",
        "managed_unobserved_task",
    ] {
        let (result, captured) = capture_unwind(|| {
            catalog::find(key).unwrap().invoke(&h.ctx, &FaultArgs::default())
        });
        assert!(result.is_ok(), "{key} should not unwind into the caller");
        assert_eq!(captured.count(&start_marker(key)), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unobserved_task_inside_runtime() {
    let h = harness(&Config::default());
    catalog::find("managed_unobserved_task")
        .unwrap()
        .invoke(&h.ctx, &FaultArgs::default());
    // The runtime survives the failed task.
    let answer = tokio::spawn(async { 42 }).await.unwrap();
    assert_eq!(answer, 42);
}

// ============================================================================
// Hangs
// ============================================================================

#[test]
fn test_hangs_use_default_and_explicit_seconds() {
    let h = harness(&Config::default());
    let (_, captured) = capture_unwind(|| {
        let desktop = catalog::find("desktop_hang").unwrap();
        desktop.invoke(&h.ctx, &FaultArgs::default());
        desktop.invoke(&h.ctx, &FaultArgs::with_seconds(3));
        catalog::find("android_anr")
            .unwrap()
            .invoke(&h.ctx, &FaultArgs::with_seconds(5));
    });

    assert_eq!(
        *h.hang.blocks.lock().unwrap(),
        vec![Duration::from_secs(10), Duration::from_secs(3)]
    );
    assert_eq!(*h.hang.anrs.lock().unwrap(), vec![Duration::from_secs(5)]);
    assert_eq!(captured.count("CRASHLAB::desktop_hang::START"), 2);
    assert_eq!(captured.count("CRASHLAB::desktop_hang::BLOCK::3s"), 1);
}

#[test]
fn test_sync_wait_hang_blocks_for_requested_time() {
    let h = harness(&Config::default());
    let started = std::time::Instant::now();
    let (result, _) = capture_unwind(|| {
        catalog::find("sync_wait_hang")
            .unwrap()
            .invoke(&h.ctx, &FaultArgs::with_seconds(1))
    });
    assert!(result.is_ok());
    assert!(started.elapsed() >= Duration::from_secs(1));
}

// ============================================================================
// Crash-class faults (fake providers)
// ============================================================================

#[test]
fn test_native_faults_route_through_provider() {
    let h = harness(&Config::default());
    let cases = [
        ("native_av", "native:segfault"),
        ("native_abort", "native:abort"),
        ("native_fatal", "native:illegal_instruction"),
    ];
    for (key, sentinel) in cases {
        let (result, captured) = capture_unwind(|| {
            catalog::find(key).unwrap().invoke(&h.ctx, &FaultArgs::default())
        });
        let payload = result.unwrap_err();
        assert_eq!(panic_text(payload.as_ref()), sentinel);
        assert_eq!(captured.count(&start_marker(key)), 1);
    }

    // Backends hear about each native fault before the provider raises it.
    let recorded = h.telemetry.native_crashes.lock().unwrap();
    assert_eq!(
        *recorded,
        vec![
            ("native_av".to_string(), "segfault".to_string()),
            ("native_abort".to_string(), "abort".to_string()),
            ("native_fatal".to_string(), "illegal_instruction".to_string()),
        ]
    );
}

#[test]
fn test_oom_heap_with_limit() {
    let config = ConfigBuilder::new()
        .heap_initial_mb(1)
        .heap_max_block_mb(2)
        .heap_limit_mb(5)
        .build();
    let h = harness(&config);
    let (result, captured) = capture_unwind(|| {
        catalog::find("oom_heap")
            .unwrap()
            .invoke(&h.ctx, &FaultArgs::default())
    });

    let payload = result.unwrap_err();
    assert!(matches!(
        FaultError::from_payload(payload.as_ref()),
        Some(FaultError::OutOfMemory { .. })
    ));
    assert_eq!(
        captured.lines()[1..],
        [
            "CRASHLAB::oom_heap::ALLOC::1MB::TOTAL::1MB".to_string(),
            "CRASHLAB::oom_heap::ALLOC::2MB::TOTAL::3MB".to_string(),
            "CRASHLAB::oom_heap::ALLOC::2MB::TOTAL::5MB".to_string(),
        ]
    );
}

#[test]
fn test_oom_heap_logs_first_four_then_every_fourth() {
    let config = ConfigBuilder::new()
        .heap_initial_mb(1)
        .heap_max_block_mb(1)
        .heap_limit_mb(9)
        .build();
    let h = harness(&config);
    let (_, captured) = capture_unwind(|| {
        catalog::find("oom_heap")
            .unwrap()
            .invoke(&h.ctx, &FaultArgs::default())
    });
    let totals: Vec<String> = captured
        .at(Level::INFO)
        .into_iter()
        .filter(|l| l.contains("::ALLOC::"))
        .collect();
    // allocations 1-4 and 8 out of 9
    assert_eq!(totals.len(), 5);
    assert!(totals[4].ends_with("TOTAL::8MB"));
}

#[test]
fn test_every_action_logs_start_exactly_once() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new()
        .heap_initial_mb(1)
        .heap_max_block_mb(1)
        .heap_limit_mb(2)
        .flood_assets_dir(tmp.path().to_path_buf())
        .denied_path(tmp.path().to_path_buf())
        .build();

    for action in catalog::actions() {
        // Real thread stack exhaustion cannot be faked in-process.
        if action.key == "native_stack_overflow" {
            continue;
        }
        let h = harness(&config);
        let args = if action.takes_seconds {
            FaultArgs::with_seconds(0)
        } else {
            FaultArgs::default()
        };
        let (_, captured) = capture_unwind(|| action.invoke(&h.ctx, &args));
        assert_eq!(
            captured.count(&start_marker(action.key)),
            1,
            "START for {}",
            action.key
        );
        assert_eq!(captured.lines()[0], start_marker(action.key));
    }
}
