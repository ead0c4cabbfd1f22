//! End-to-end tests for the `crashlab` binary
//!
//! Every test runs the binary as a child process with its own config file,
//! prefs store and report directory, so crash-class actions can take the
//! process down without affecting the test runner.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;
use tempfile::TempDir;

// ============================================================================
// Test helpers
// ============================================================================

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self::with_extra_config("")
    }

    /// Sandbox whose config file ends with the `extra` YAML sections.
    fn with_extra_config(extra: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = format!(
            "prefs:\n  path: {}\nreports:\n  dir: {}\n{extra}",
            dir.path().join("prefs.json").display(),
            dir.path().join("reports").display(),
        );
        std::fs::write(dir.path().join("config.yaml"), config).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn reports_dir(&self) -> PathBuf {
        self.path().join("reports")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_crashlab"));
        cmd.arg("--config")
            .arg(self.path().join("config.yaml"))
            .args(args)
            .env("XDG_DATA_HOME", self.path().join("data"))
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("ARTIFACTS_ROOT", self.path().join("Artifacts"))
            .env_remove("RUST_LOG")
            .env_remove("SENTRY_DSN")
            .env_remove("ENVIRONMENT")
            .env_remove("BUNDLE_ID")
            .env_remove("BUNDLE_ID_ANDROID")
            .env_remove("ANDROID_APPLICATION_ID")
            .env_remove("BUNDLE_ID_IOS")
            .env_remove("IOS_BUNDLE_ID")
            .stdin(Stdio::null());
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().unwrap()
    }

    fn run_with_stdin(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
        child.wait_with_output().unwrap()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", stdout(output)))
}

// ============================================================================
// Catalog
// ============================================================================

#[test]
fn test_list_json_is_ordered_catalog() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["list", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let actions = json(&output);
    let actions = actions.as_array().unwrap();
    assert_eq!(actions[0]["key"], "managed_null_ref");
    assert_eq!(actions[0]["index"], 1);
    assert!(actions.iter().any(|a| a["key"] == "native_abort"));
    assert!(actions
        .iter()
        .filter(|a| a["takes_seconds"] == true)
        .all(|a| a["group"] == "error"));
}

#[test]
fn test_list_group_filter() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["list", "--group", "crash", "--json"]);
    assert!(output.status.success());

    let actions = json(&output);
    let actions = actions.as_array().unwrap();
    assert!(!actions.is_empty());
    assert!(actions.iter().all(|a| a["group"] == "crash"));
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn test_recoverable_fault_reaches_process_boundary() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["run", "managed_div_zero"]);

    assert_eq!(output.status.code(), Some(101));
    let err = stderr(&output);
    assert!(err.contains("CRASHLAB::managed_div_zero::START"), "{err}");
    assert!(err.contains("DivideByZero"), "{err}");
}

#[test]
fn test_unknown_action_is_an_error() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["run", "no_such_action"]);

    assert!(!output.status.success());
    assert_ne!(output.status.code(), Some(101));
    assert!(stderr(&output).contains("Unknown action 'no_such_action'"));
}

#[test]
fn test_hang_returns_after_requested_seconds() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["run", "desktop_hang", "--seconds", "1", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let result = json(&output);
    assert_eq!(result["action"], "desktop_hang");
    assert_eq!(result["returned"], true);
    assert!(stderr(&output).contains("CRASHLAB::desktop_hang::BLOCK::1s"));
}

#[test]
fn test_legacy_alias_runs_current_action() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["run", "managed_exception"]);

    assert_eq!(output.status.code(), Some(101));
    assert!(stderr(&output).contains("CRASHLAB::managed_unhandled::START"));
}

#[cfg(unix)]
#[test]
fn test_native_abort_dies_by_signal() {
    use std::os::unix::process::ExitStatusExt;

    let sandbox = Sandbox::new();
    let output = sandbox.run(&["run", "native_abort"]);

    // SIGABRT
    assert_eq!(output.status.signal(), Some(6));
    assert!(stderr(&output).contains("CRASHLAB::native_abort::START"));
}

#[cfg(unix)]
fn assert_killed_by(action: &str, signals: &[i32]) {
    use std::os::unix::process::ExitStatusExt;

    let sandbox = Sandbox::new();
    let output = sandbox.run(&["run", action]);

    let signal = output.status.signal();
    assert!(
        signal.is_some_and(|s| signals.contains(&s)),
        "{action} ended with {:?}",
        output.status
    );
    assert!(stderr(&output).contains(&format!("CRASHLAB::{action}::START")));
}

#[cfg(unix)]
#[test]
fn test_native_av_dies_by_sigsegv() {
    assert_killed_by("native_av", &[11]);
}

#[cfg(unix)]
#[test]
fn test_native_fatal_dies_by_sigill() {
    assert_killed_by("native_fatal", &[4]);
}

#[cfg(unix)]
#[test]
fn test_native_stack_overflow_terminates() {
    // The runtime reports the overflow and aborts; a bare guard-page hit is SIGSEGV.
    assert_killed_by("native_stack_overflow", &[6, 11]);
}

#[test]
fn test_oom_heap_terminates_process() {
    let sandbox = Sandbox::with_extra_config(
        "faults:\n  heap_initial_mb: 1\n  heap_max_block_mb: 2\n  heap_limit_mb: 8\n",
    );
    let output = sandbox.run(&["run", "oom_heap"]);

    assert_eq!(output.status.code(), Some(101));
    let err = stderr(&output);
    assert!(err.contains("CRASHLAB::oom_heap::START"), "{err}");
    assert!(err.contains("CRASHLAB::oom_heap::ALLOC::1MB::TOTAL::1MB"), "{err}");
}

#[test]
fn test_noop_backend_logs_metadata_marker() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["run", "desktop_hang", "--seconds", "1"]);
    assert!(output.status.success());

    let err = stderr(&output);
    assert!(err.contains("CRASHLAB::META::run_id="), "{err}");
    assert!(err.contains("CRASHLAB::INIT::run_id="), "{err}");
}

// ============================================================================
// Interactive
// ============================================================================

#[test]
fn test_interactive_survives_recoverable_fault() {
    let sandbox = Sandbox::new();
    let output = sandbox.run_with_stdin(
        &["interactive", "--json"],
        "managed_key_not_found\ndesktop_hang 1\nquit\n",
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("\"returned\": false"), "{out}");
    assert!(out.contains("\"fault_kind\": \"KeyNotFound\""), "{out}");
    assert!(out.contains("\"returned\": true"), "{out}");
    assert!(stderr(&output).contains("Unhandled fault in managed_key_not_found"));
}

// ============================================================================
// Triggers and startup trampoline
// ============================================================================

#[test]
fn test_deeplink_dispatches_action() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["deeplink", "crashlab://action/managed_null_ref?source=test"]);

    assert_eq!(output.status.code(), Some(101));
    let err = stderr(&output);
    assert!(err.contains("CRASHLAB::DEEPLINK::"), "{err}");
    assert!(err.contains("CRASHLAB::managed_null_ref::START"), "{err}");
}

#[test]
fn test_unknown_intent_exits_cleanly() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["intent", "bogus", "--json"]);
    assert!(output.status.success());

    assert_eq!(json(&output)["handled"], false);
    assert!(stderr(&output).contains("CRASHLAB::ACTION::UNKNOWN::bogus"));
}

#[test]
fn test_scheduled_action_fires_once_on_next_launch() {
    let sandbox = Sandbox::new();
    let scheduled = sandbox.run(&["schedule-startup", "--action", "managed_null_ref"]);
    assert!(scheduled.status.success(), "{}", stderr(&scheduled));

    let first = sandbox.run(&["run", "desktop_hang", "--seconds", "1"]);
    assert_eq!(first.status.code(), Some(101));
    let err = stderr(&first);
    assert!(err.contains("CRASHLAB::startup_crash::RUN::managed_null_ref"), "{err}");

    let second = sandbox.run(&["run", "desktop_hang", "--seconds", "1"]);
    assert!(second.status.success(), "{}", stderr(&second));
    assert!(!stderr(&second).contains("startup_crash::RUN"));
}

#[test]
fn test_schedule_rejects_unknown_action() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["schedule-startup", "--action", "nope"]);
    assert!(!output.status.success());
    assert!(!sandbox.path().join("prefs.json").exists());
}

#[test]
fn test_schedule_clear() {
    let sandbox = Sandbox::new();
    assert!(sandbox.run(&["schedule-startup"]).status.success());

    let cleared = sandbox.run(&["schedule-startup", "--clear", "--json"]);
    assert!(cleared.status.success());
    assert_eq!(json(&cleared)["cleared"], "native_abort");

    let again = sandbox.run(&["schedule-startup", "--clear", "--json"]);
    assert_eq!(json(&again)["cleared"], Value::Null);
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn test_meta_apply_persists_values() {
    let sandbox = Sandbox::new();
    let applied = sandbox.run(&["meta", "apply", "--environment", "staging", "--json"]);
    assert!(applied.status.success(), "{}", stderr(&applied));
    assert_eq!(json(&applied)["environment"], "staging");
    assert!(stderr(&applied).contains("CRASHLAB::META::APPLIED::unknown"));

    let shown = sandbox.run(&["meta", "show", "--json"]);
    assert!(shown.status.success());
    assert_eq!(json(&shown)["environment"], "staging");
}

#[test]
fn test_meta_show_before_any_session_has_no_user() {
    let sandbox = Sandbox::new();
    let shown = sandbox.run(&["meta", "show", "--json"]);
    assert!(shown.status.success(), "{}", stderr(&shown));
    assert!(json(&shown)["user_id"].is_null());

    let human = sandbox.run(&["meta", "show"]);
    assert!(stdout(&human).contains("(unset)"));
}

#[test]
fn test_meta_apply_without_fields_fails() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["meta", "apply"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Nothing to apply"));
}

// ============================================================================
// Build planning
// ============================================================================

#[test]
fn test_build_plan_and_sidecar_roundtrip() {
    let sandbox = Sandbox::new();
    let private_dir = sandbox.path().join("private");
    let output = sandbox.run(&[
        "build",
        "plan",
        "android-arm64",
        "crashlytics",
        "--write-sidecar",
        "--private-dir",
        private_dir.to_str().unwrap(),
        "--json",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let plan = json(&output);
    assert_eq!(plan["cargo_feature"], "crashlytics");
    assert_eq!(plan["triple"], "aarch64-linux-android");
    assert_eq!(plan["sidecars"].as_array().unwrap().len(), 2);
    assert!(plan["cargo_args"]
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a == "--release"));

    let sidecar = private_dir.join("build.json");
    let read = sandbox.run(&["build", "read", sidecar.to_str().unwrap(), "--json"]);
    assert!(read.status.success(), "{}", stderr(&read));
    let metadata = json(&read);
    assert_eq!(metadata["target"], "android-arm64");
    assert_eq!(metadata["development"], false);
}

#[test]
fn test_build_plan_resolves_application_id() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["build", "plan", "android-arm64", "sentry", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let plan = json(&output);
    assert_eq!(plan["application_id"], "com.aincrade.crashlab.sentry.android");
    assert_eq!(
        plan["cargo_env"]["CRASHLAB_APPLICATION_ID"],
        "com.aincrade.crashlab.sentry.android"
    );

    let output = sandbox
        .command(&["build", "plan", "android-arm64", "sentry", "--json"])
        .env("ANDROID_APPLICATION_ID", "org.example.droid")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(json(&output)["application_id"], "org.example.droid");
}

#[test]
fn test_build_plan_rejects_crashlytics_on_desktop() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["build", "plan", "windows-x64", "crashlytics"]);
    assert!(!output.status.success());
}

#[test]
fn test_build_matrix_json() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["build", "matrix", "--json"]);
    assert!(output.status.success());

    let plans = json(&output);
    let plans = plans.as_array().unwrap();
    assert!(plans
        .iter()
        .filter(|p| p["flavor"] == "crashlytics")
        .all(|p| p["target"] == "android-arm64" || p["target"] == "ios-arm64"));
}

// ============================================================================
// Reports
// ============================================================================

fn write_report(dir: &Path, stem: &str) {
    std::fs::create_dir_all(dir).unwrap();
    let report = serde_json::json!({
        "id": stem,
        "panic_message": "DivideByZero: Attempted to divide by zero",
    });
    std::fs::write(dir.join(format!("{stem}.json")), report.to_string()).unwrap();
}

#[test]
fn test_report_list_view_delete() {
    let sandbox = Sandbox::new();
    write_report(&sandbox.reports_dir(), "crash-20260101-aaaa1111");
    write_report(&sandbox.reports_dir(), "crash-20260102-bbbb2222");

    let listed = sandbox.run(&["report", "list", "--json"]);
    assert!(listed.status.success(), "{}", stderr(&listed));
    let entries = json(&listed);
    assert_eq!(entries.as_array().unwrap().len(), 2);
    assert_eq!(entries[0]["id"], "bbbb2222");

    let viewed = sandbox.run(&["report", "view", "aaaa1111", "--raw"]);
    assert!(viewed.status.success());
    assert!(stdout(&viewed).contains("DivideByZero"));

    let deleted = sandbox.run(&["report", "delete", "aaaa1111"]);
    assert!(deleted.status.success());
    let missing = sandbox.run(&["report", "view", "aaaa1111"]);
    assert!(!missing.status.success());

    let all = sandbox.run(&["report", "delete", "--all"]);
    assert!(all.status.success());
    assert_eq!(std::fs::read_dir(sandbox.reports_dir()).unwrap().count(), 0);
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_validate_accepts_sandbox_config() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["config", "validate", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(json(&output)["valid"], true);
}

#[test]
fn test_config_validate_reports_bad_file() {
    let sandbox = Sandbox::new();
    std::fs::write(
        sandbox.path().join("config.yaml"),
        "logging:\n  level: loud\n",
    )
    .unwrap();

    let output = sandbox.run(&["config", "validate", "--json"]);
    assert!(!output.status.success());
    let result = json(&output);
    assert_eq!(result["valid"], false);
    assert!(result["errors"][0]
        .as_str()
        .unwrap()
        .starts_with("logging.level"));
}

#[test]
fn test_invalid_log_level_fails_before_running() {
    let sandbox = Sandbox::new();
    let config = format!(
        "logging:\n  level: verbose\nprefs:\n  path: {}\n",
        sandbox.path().join("prefs.json").display()
    );
    std::fs::write(sandbox.path().join("config.yaml"), config).unwrap();

    let output = sandbox.run(&["run", "desktop_hang", "--seconds", "0"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("logging.level"), "{err}");
    assert!(!err.contains("CRASHLAB::desktop_hang::START"));
}

#[test]
fn test_unparseable_config_fails_other_commands() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.path().join("config.yaml"), "unknown_section: 1\n").unwrap();

    let output = sandbox.run(&["list"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to load configuration"));
}
