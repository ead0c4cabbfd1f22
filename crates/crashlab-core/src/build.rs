//! Build planning
//!
//! Resolves a (target, flavor) pair into everything a release pipeline needs:
//! the cargo feature that compiles the backend in, the rust target triple,
//! artifact locations, and the metadata sidecar consumed by post-build
//! tooling (symbol upload and the like).

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{CrashlabError, Flavor};

/// File name of the sidecar in both the private dir and the artifact dir.
pub const SIDECAR_FILE: &str = "build.json";

/// Root used for artifact directories when `ARTIFACTS_ROOT` is unset.
pub const DEFAULT_ARTIFACTS_ROOT: &str = "Artifacts";

/// Prefix of generated application identifiers.
pub const DEFAULT_ID_PREFIX: &str = "com.aincrade.crashlab";

/// Build-time variable carrying the resolved application identifier.
pub const APPLICATION_ID_ENV: &str = "CRASHLAB_APPLICATION_ID";

/// Player platform a build is produced for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetPlatform {
    #[serde(rename = "windows-x64")]
    WindowsX64,
    #[serde(rename = "macos-arm64")]
    MacosArm64,
    #[serde(rename = "android-arm64")]
    AndroidArm64,
    #[serde(rename = "ios-arm64")]
    IosArm64,
    #[serde(rename = "linux-x64")]
    LinuxX64,
}

impl TargetPlatform {
    pub const ALL: [TargetPlatform; 5] = [
        TargetPlatform::WindowsX64,
        TargetPlatform::MacosArm64,
        TargetPlatform::AndroidArm64,
        TargetPlatform::IosArm64,
        TargetPlatform::LinuxX64,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetPlatform::WindowsX64 => "windows-x64",
            TargetPlatform::MacosArm64 => "macos-arm64",
            TargetPlatform::AndroidArm64 => "android-arm64",
            TargetPlatform::IosArm64 => "ios-arm64",
            TargetPlatform::LinuxX64 => "linux-x64",
        }
    }

    /// Rust target triple passed to `cargo build --target`.
    pub fn triple(&self) -> &'static str {
        match self {
            TargetPlatform::WindowsX64 => "x86_64-pc-windows-msvc",
            TargetPlatform::MacosArm64 => "aarch64-apple-darwin",
            TargetPlatform::AndroidArm64 => "aarch64-linux-android",
            TargetPlatform::IosArm64 => "aarch64-apple-ios",
            TargetPlatform::LinuxX64 => "x86_64-unknown-linux-gnu",
        }
    }

    /// Short platform name used in generated identifiers.
    pub fn platform(&self) -> &'static str {
        match self {
            TargetPlatform::WindowsX64 => "windows",
            TargetPlatform::MacosArm64 => "macos",
            TargetPlatform::AndroidArm64 => "android",
            TargetPlatform::IosArm64 => "ios",
            TargetPlatform::LinuxX64 => "linux",
        }
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self, TargetPlatform::AndroidArm64 | TargetPlatform::IosArm64)
    }

    /// Real flavors this target can ship with. Crashlytics is mobile-only.
    pub fn supported_flavors(&self) -> &'static [Flavor] {
        if self.is_mobile() {
            &[Flavor::Sentry, Flavor::Crashlytics, Flavor::UnityDiagnostics]
        } else {
            &[Flavor::Sentry, Flavor::UnityDiagnostics]
        }
    }

    pub fn supports(&self, flavor: Flavor) -> bool {
        flavor == Flavor::None || self.supported_flavors().contains(&flavor)
    }

    /// Default player output inside `artifact_dir`.
    fn default_output(&self, artifact_dir: &Path) -> PathBuf {
        match self {
            TargetPlatform::WindowsX64 => artifact_dir.join("CrashLab.exe"),
            TargetPlatform::MacosArm64 => artifact_dir.join("CrashLab.app"),
            TargetPlatform::AndroidArm64 => artifact_dir.join("CrashLab.apk"),
            // Xcode project export: the directory itself is the output
            TargetPlatform::IosArm64 => artifact_dir.to_path_buf(),
            TargetPlatform::LinuxX64 => artifact_dir.join("crashlab"),
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TargetPlatform {
    type Err = CrashlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == key)
            .ok_or_else(|| CrashlabError::UnknownTarget(s.to_string()))
    }
}

/// Sidecar describing a produced build
///
/// Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub target: String,
    pub flavor: String,
    pub development: bool,
    pub output: String,
    pub commit_sha: String,
}

impl BuildMetadata {
    /// Single-line JSON as written to disk.
    pub fn to_json(&self) -> Result<String, CrashlabError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Application identifier overrides, usually taken from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierOverrides {
    /// `BUNDLE_ID`, applied to every target.
    pub generic: Option<String>,
    /// `BUNDLE_ID_ANDROID`, else `ANDROID_APPLICATION_ID`.
    pub android: Option<String>,
    /// `BUNDLE_ID_IOS`, else `IOS_BUNDLE_ID`.
    pub ios: Option<String>,
}

impl IdentifierOverrides {
    pub fn from_env() -> Self {
        Self {
            generic: non_empty_env("BUNDLE_ID"),
            android: non_empty_env("BUNDLE_ID_ANDROID").or_else(|| non_empty_env("ANDROID_APPLICATION_ID")),
            ios: non_empty_env("BUNDLE_ID_IOS").or_else(|| non_empty_env("IOS_BUNDLE_ID")),
        }
    }

    /// Generic override, then the mobile platform override, then
    /// `com.aincrade.crashlab.<flavor>.<platform>`.
    pub fn resolve(&self, target: TargetPlatform, flavor: Flavor) -> String {
        let platform = match target {
            TargetPlatform::AndroidArm64 => self.android.as_ref(),
            TargetPlatform::IosArm64 => self.ios.as_ref(),
            _ => None,
        };
        self.generic
            .as_ref()
            .or(platform)
            .cloned()
            .unwrap_or_else(|| {
                format!("{DEFAULT_ID_PREFIX}.{}.{}", flavor.as_str(), target.platform()).to_lowercase()
            })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Fully resolved build for one (target, flavor) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub target: TargetPlatform,
    pub flavor: Flavor,
    /// Bundle id / application id the player ships under.
    pub application_id: String,
    /// `crashlab-cli` feature selecting the backend, if any.
    pub cargo_feature: Option<&'static str>,
    pub triple: &'static str,
    pub artifact_dir: PathBuf,
    pub output: PathBuf,
    pub metadata: BuildMetadata,
}

/// Inputs to [`BuildPlan::resolve`] besides target and flavor
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub development: bool,
    /// Explicit output path; overrides the per-target default.
    pub output: Option<PathBuf>,
    pub artifacts_root: PathBuf,
    pub commit_sha: String,
    pub identifiers: IdentifierOverrides,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            development: false,
            output: None,
            artifacts_root: PathBuf::from(DEFAULT_ARTIFACTS_ROOT),
            commit_sha: String::new(),
            identifiers: IdentifierOverrides::default(),
        }
    }
}

impl BuildOptions {
    /// Options for a CI build: artifacts root from `ARTIFACTS_ROOT`, commit
    /// sha from git or `COMMIT_SHA`, identifier overrides from `BUNDLE_ID*`.
    pub fn from_env(development: bool, output: Option<PathBuf>) -> Self {
        Self {
            development,
            output,
            artifacts_root: artifacts_root_from_env(),
            commit_sha: detect_commit_sha(),
            identifiers: IdentifierOverrides::from_env(),
        }
    }
}

impl BuildPlan {
    /// Resolves `target` and `flavor` keys into a plan.
    ///
    /// Unknown flavor keys fall back to Unity diagnostics. Unknown targets and
    /// flavors the target cannot ship are errors.
    pub fn resolve(target: &str, flavor: &str, options: &BuildOptions) -> Result<Self, CrashlabError> {
        let target: TargetPlatform = target.parse()?;
        let flavor = Flavor::parse_or_default(flavor);
        Self::for_pair(target, flavor, options)
    }

    /// Plans an already-parsed pair.
    pub fn for_pair(
        target: TargetPlatform,
        flavor: Flavor,
        options: &BuildOptions,
    ) -> Result<Self, CrashlabError> {
        if !target.supports(flavor) {
            return Err(CrashlabError::UnsupportedFlavor {
                target: target.to_string(),
                flavor: flavor.to_string(),
            });
        }

        let artifact_dir = options
            .artifacts_root
            .join(format!("{}-{}", target.as_str(), flavor.as_str()));
        let output = options
            .output
            .clone()
            .unwrap_or_else(|| target.default_output(&artifact_dir));

        let metadata = BuildMetadata {
            target: target.to_string(),
            flavor: flavor.to_string(),
            development: options.development,
            output: output.to_string_lossy().into_owned(),
            commit_sha: options.commit_sha.clone(),
        };

        let application_id = options.identifiers.resolve(target, flavor);
        tracing::debug!(%target, %flavor, application_id = %application_id, "Resolved application identifier");

        Ok(Self {
            target,
            flavor,
            application_id,
            cargo_feature: flavor.cargo_feature(),
            triple: target.triple(),
            artifact_dir,
            output,
            metadata,
        })
    }

    /// `cargo build` arguments reproducing this plan.
    pub fn cargo_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "-p".to_string(),
            "crashlab-cli".to_string(),
            "--target".to_string(),
            self.triple.to_string(),
        ];
        if !self.metadata.development {
            args.push("--release".to_string());
        }
        if let Some(feature) = self.cargo_feature {
            args.push("--features".to_string());
            args.push(feature.to_string());
        }
        args
    }

    /// Environment for the `cargo build` invocation.
    pub fn cargo_env(&self) -> Vec<(&'static str, String)> {
        vec![(APPLICATION_ID_ENV, self.application_id.clone())]
    }

    /// Writes the sidecar to `private_dir` and mirrors it into the artifact
    /// directory. Failures are logged; the paths actually written are returned.
    pub fn write_sidecar(&self, private_dir: &Path) -> Vec<PathBuf> {
        write_sidecar(&self.metadata, private_dir, &self.artifact_dir)
    }
}

/// Plans every supported (target, flavor) combination.
pub fn plan_matrix(options: &BuildOptions) -> Vec<BuildPlan> {
    TargetPlatform::ALL
        .into_iter()
        .flat_map(|target| {
            target
                .supported_flavors()
                .iter()
                .filter_map(move |flavor| BuildPlan::for_pair(target, *flavor, options).ok())
        })
        .collect()
}

/// `ARTIFACTS_ROOT`, or [`DEFAULT_ARTIFACTS_ROOT`].
pub fn artifacts_root_from_env() -> PathBuf {
    std::env::var("ARTIFACTS_ROOT")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_ROOT))
}

/// Default private directory holding the primary sidecar copy.
pub fn default_private_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("crashlab")
}

/// Short commit sha: `git rev-parse --short=9 HEAD`, else `COMMIT_SHA`, else empty.
pub fn detect_commit_sha() -> String {
    let from_git = Command::new("git")
        .args(["rev-parse", "--short=9", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|sha| !sha.is_empty());

    from_git
        .or_else(|| std::env::var("COMMIT_SHA").ok().filter(|v| !v.is_empty()))
        .unwrap_or_default()
}

/// Writes `metadata` as single-line JSON into each directory.
pub fn write_sidecar(metadata: &BuildMetadata, private_dir: &Path, artifact_dir: &Path) -> Vec<PathBuf> {
    let json = match metadata.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to serialize build metadata: {e}");
            return Vec::new();
        }
    };

    let mut written = Vec::new();
    for dir in [private_dir, artifact_dir] {
        let path = dir.join(SIDECAR_FILE);
        let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, &json));
        match result {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Wrote build metadata");
                written.push(path);
            }
            Err(e) => tracing::warn!(path = %path.display(), "Failed to write build metadata: {e}"),
        }
    }
    written
}

/// Reads a sidecar previously written by [`write_sidecar`].
pub fn read_sidecar(path: &Path) -> Result<BuildMetadata, CrashlabError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(content.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(root: &Path) -> BuildOptions {
        BuildOptions {
            development: true,
            output: None,
            artifacts_root: root.to_path_buf(),
            commit_sha: "abc123def".to_string(),
            identifiers: IdentifierOverrides::default(),
        }
    }

    fn overrides(generic: Option<&str>, android: Option<&str>, ios: Option<&str>) -> IdentifierOverrides {
        IdentifierOverrides {
            generic: generic.map(str::to_string),
            android: android.map(str::to_string),
            ios: ios.map(str::to_string),
        }
    }

    #[test]
    fn test_resolve_android_crashlytics() {
        let plan = BuildPlan::resolve("android-arm64", "crashlytics", &options(Path::new("out"))).unwrap();
        assert_eq!(plan.cargo_feature, Some("crashlytics"));
        assert_eq!(plan.triple, "aarch64-linux-android");
        assert_eq!(plan.artifact_dir, PathBuf::from("out/android-arm64-crashlytics"));
        assert_eq!(plan.output, PathBuf::from("out/android-arm64-crashlytics/CrashLab.apk"));
    }

    #[test]
    fn test_application_id_defaults_per_platform() {
        let ids = IdentifierOverrides::default();
        assert_eq!(
            ids.resolve(TargetPlatform::AndroidArm64, Flavor::Crashlytics),
            "com.aincrade.crashlab.crashlytics.android"
        );
        assert_eq!(
            ids.resolve(TargetPlatform::WindowsX64, Flavor::Sentry),
            "com.aincrade.crashlab.sentry.windows"
        );
        assert_eq!(
            ids.resolve(TargetPlatform::IosArm64, Flavor::UnityDiagnostics),
            format!("com.aincrade.crashlab.{}.ios", Flavor::UnityDiagnostics.as_str())
        );
    }

    #[test]
    fn test_generic_application_id_wins() {
        let ids = overrides(Some("org.example.lab"), Some("org.example.droid"), Some("org.example.ios"));
        assert_eq!(ids.resolve(TargetPlatform::AndroidArm64, Flavor::Sentry), "org.example.lab");
        assert_eq!(ids.resolve(TargetPlatform::IosArm64, Flavor::Sentry), "org.example.lab");
        assert_eq!(ids.resolve(TargetPlatform::LinuxX64, Flavor::Sentry), "org.example.lab");
    }

    #[test]
    fn test_platform_application_id_overrides() {
        let ids = overrides(None, Some("org.example.droid"), Some("org.example.ios"));
        assert_eq!(ids.resolve(TargetPlatform::AndroidArm64, Flavor::Sentry), "org.example.droid");
        assert_eq!(ids.resolve(TargetPlatform::IosArm64, Flavor::Sentry), "org.example.ios");
        // desktop targets ignore the mobile overrides
        assert_eq!(
            ids.resolve(TargetPlatform::MacosArm64, Flavor::Sentry),
            "com.aincrade.crashlab.sentry.macos"
        );
    }

    #[test]
    fn test_plan_carries_application_id_to_cargo_env() {
        let mut opts = options(Path::new("out"));
        opts.identifiers = overrides(None, None, Some("org.example.ios"));
        let plan = BuildPlan::resolve("ios-arm64", "sentry", &opts).unwrap();
        assert_eq!(plan.application_id, "org.example.ios");
        assert_eq!(
            plan.cargo_env(),
            vec![(APPLICATION_ID_ENV, "org.example.ios".to_string())]
        );
        // the sidecar keeps its fixed key set
        assert!(!plan.metadata.to_json().unwrap().contains("application_id"));
    }

    #[test]
    fn test_ios_output_is_artifact_dir() {
        let plan = BuildPlan::resolve("ios-arm64", "sentry", &options(Path::new("out"))).unwrap();
        assert_eq!(plan.output, plan.artifact_dir);
    }

    #[test]
    fn test_unknown_flavor_falls_back_to_unity() {
        let plan = BuildPlan::resolve("windows-x64", "bugsnag", &options(Path::new("out"))).unwrap();
        assert_eq!(plan.flavor, Flavor::UnityDiagnostics);
        assert_eq!(plan.cargo_feature, Some("unity-diagnostics"));
        assert!(plan.output.ends_with("windows-x64-unity/CrashLab.exe"));
    }

    #[test]
    fn test_crashlytics_rejected_on_desktop() {
        let err = BuildPlan::resolve("macos-arm64", "crashlytics", &options(Path::new("out"))).unwrap_err();
        assert!(matches!(err, CrashlabError::UnsupportedFlavor { .. }));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let err = BuildPlan::resolve("ps5", "sentry", &options(Path::new("out"))).unwrap_err();
        assert!(matches!(err, CrashlabError::UnknownTarget(t) if t == "ps5"));
    }

    #[test]
    fn test_output_override() {
        let mut opts = options(Path::new("out"));
        opts.output = Some(PathBuf::from("/tmp/custom/CrashLab"));
        let plan = BuildPlan::resolve("linux-x64", "sentry", &opts).unwrap();
        assert_eq!(plan.output, PathBuf::from("/tmp/custom/CrashLab"));
        assert_eq!(plan.metadata.output, "/tmp/custom/CrashLab");
    }

    #[test]
    fn test_metadata_json_key_order() {
        let meta = BuildMetadata {
            target: "linux-x64".into(),
            flavor: "sentry".into(),
            development: false,
            output: "Artifacts/linux-x64-sentry/crashlab".into(),
            commit_sha: "".into(),
        };
        assert_eq!(
            meta.to_json().unwrap(),
            r#"{"target":"linux-x64","flavor":"sentry","development":false,"output":"Artifacts/linux-x64-sentry/crashlab","commit_sha":""}"#
        );
    }

    #[test]
    fn test_matrix_covers_supported_pairs() {
        let plans = plan_matrix(&options(Path::new("out")));
        // 3 desktop targets x 2 flavors + 2 mobile targets x 3 flavors
        assert_eq!(plans.len(), 12);
        assert!(plans
            .iter()
            .all(|p| p.flavor != Flavor::Crashlytics || p.target.is_mobile()));
    }

    #[test]
    fn test_cargo_args_release_build() {
        let mut opts = options(Path::new("out"));
        opts.development = false;
        let plan = BuildPlan::resolve("linux-x64", "sentry", &opts).unwrap();
        let args = plan.cargo_args();
        assert!(args.contains(&"--release".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("sentry"));
    }

    #[test]
    fn test_sidecar_written_to_both_dirs_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let plan = BuildPlan::resolve("linux-x64", "unity", &options(&tmp.path().join("artifacts"))).unwrap();
        let private = tmp.path().join("private");

        let written = plan.write_sidecar(&private);
        assert_eq!(written.len(), 2);

        let content = std::fs::read_to_string(private.join(SIDECAR_FILE)).unwrap();
        assert!(!content.contains('\n'));

        let mirrored = read_sidecar(&plan.artifact_dir.join(SIDECAR_FILE)).unwrap();
        assert_eq!(mirrored, plan.metadata);
    }

    #[test]
    fn test_sidecar_failure_is_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let plan = BuildPlan::resolve("linux-x64", "sentry", &options(&tmp.path().join("a"))).unwrap();
        // private dir is a regular file, so only the mirror succeeds
        let written = plan.write_sidecar(&blocker);
        assert_eq!(written.len(), 1);
    }
}
