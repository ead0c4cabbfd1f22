//! Asset flood
//!
//! Loads every resource registered under a label over and over, keeping each
//! load alive and (when forcing out-of-memory) a byte-for-byte duplicate of
//! it, until the process runs out of memory or the configured budget is
//! exceeded.
//!
//! ## Markers
//!
//! All markers are prefixed with `CRASHLAB::asset_bundle_flood::`:
//!
//! | marker | level |
//! |---|---|
//! | `RUNNING` | warn, re-entry rejected |
//! | `NO_LOCATIONS::<label>` | warn |
//! | `LOAD_FAIL::<key>` | warn |
//! | `PASS::<n>::loaded=<count>::mem=<MB>MB` | info |
//! | `COMPLETE::loads=<n>::passes=<p>` | info |
//! | `OOM` | error, re-raised after cleanup |
//! | `ERROR::<kind>:<message>` | error, not re-raised |
//! | `RELEASE_FAIL::<key>::<kind>:<message>` | warn |
//! | `END` | info, always last |

use std::collections::TryReserveError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crashlab_core::domain::{FaultError, MARKER_NAMESPACE};
use crashlab_core::ports::{Breadcrumb, ITelemetryService};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, info, warn};

/// Action key the flood markers are namespaced under.
pub const FLOOD_MARKER_KEY: &str = "asset_bundle_flood";

/// Label resources are registered under by default.
pub const DEFAULT_FLOOD_LABEL: &str = "crashlab.asset_flood";

/// Breadcrumb category for flood events.
pub const BREADCRUMB_CATEGORY: &str = "crashlab.asset_bundle_flood";

/// Placeholder duplicate size for empty resources.
const EMPTY_DUPLICATE_BYTES: usize = 256;

const MIB: f64 = 1024.0 * 1024.0;

fn marker(suffix: impl fmt::Display) -> String {
    format!("{MARKER_NAMESPACE}::{FLOOD_MARKER_KEY}::{suffix}")
}

// ============================================================================
// Resource source port
// ============================================================================

/// Identity of a loadable resource (relative path for directory sources)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A loaded resource; owned by the flood arena until released
#[derive(Debug)]
pub struct Resource {
    pub key: ResourceKey,
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`
    pub digest: String,
}

impl Resource {
    pub fn new(key: ResourceKey, bytes: Vec<u8>) -> Self {
        let digest = format!("{:x}", Sha256::digest(&bytes));
        Self { key, bytes, digest }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Errors reported by a [`ResourceSource`]
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Release rejected for {key}: {reason}")]
    ReleaseRejected { key: String, reason: String },
}

impl ResourceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceError::NotFound(_) => "NotFound",
            ResourceError::Io(_) => "Io",
            ResourceError::ReleaseRejected { .. } => "ReleaseRejected",
        }
    }
}

/// Port for the resource system the flood draws from
pub trait ResourceSource: Send + Sync {
    /// Keys registered under `label`, in load order.
    fn locations(&self, label: &str) -> Result<Vec<ResourceKey>, ResourceError>;

    /// Loads one resource.
    fn load(&self, key: &ResourceKey) -> Result<Resource, ResourceError>;

    /// Returns a resource obtained from [`load`](Self::load).
    fn release(&self, resource: Resource) -> Result<(), ResourceError>;
}

/// Resources are the files under `<root>/<label>`, keyed by relative path
pub struct DirectoryResourceSource {
    root: PathBuf,
    outstanding: AtomicUsize,
}

impl DirectoryResourceSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            outstanding: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn walk(dir: &Path, base: &Path, out: &mut Vec<ResourceKey>) -> Result<(), ResourceError> {
        let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                Self::walk(&path, base, out)?;
            } else if let Ok(relative) = path.strip_prefix(base) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(ResourceKey::new(key));
            }
        }
        Ok(())
    }
}

impl ResourceSource for DirectoryResourceSource {
    fn locations(&self, label: &str) -> Result<Vec<ResourceKey>, ResourceError> {
        let base = self.root.join(label);
        if !base.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        Self::walk(&base, &self.root, &mut keys)?;
        Ok(keys)
    }

    fn load(&self, key: &ResourceKey) -> Result<Resource, ResourceError> {
        let path = self.root.join(key.as_str());
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ResourceError::NotFound(key.to_string()),
            _ => ResourceError::Io(e),
        })?;
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(Resource::new(key.clone(), bytes))
    }

    fn release(&self, resource: Resource) -> Result<(), ResourceError> {
        drop(resource);
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Arena
// ============================================================================

/// Invocation-scoped owner of everything a flood has loaded or duplicated
struct FloodArena {
    loaded: Vec<Resource>,
    duplicates: Vec<Vec<u8>>,
    bytes: u64,
    budget: Option<u64>,
}

impl FloodArena {
    fn new(budget: Option<u64>) -> Self {
        Self {
            loaded: Vec::new(),
            duplicates: Vec::new(),
            bytes: 0,
            budget,
        }
    }

    fn charge(&mut self, len: usize) -> Result<(), FaultError> {
        let requested = len as u64;
        if let Some(budget) = self.budget {
            if self.bytes.saturating_add(requested) > budget {
                return Err(FaultError::OutOfMemory {
                    requested,
                    total: self.bytes,
                });
            }
        }
        self.bytes += requested;
        Ok(())
    }

    fn keep(&mut self, resource: Resource) -> Result<(), (Resource, FaultError)> {
        if let Err(e) = self.charge(resource.len()) {
            return Err((resource, e));
        }
        self.loaded.push(resource);
        Ok(())
    }

    fn duplicate(&mut self, resource: &Resource) -> Result<(), FaultError> {
        let len = if resource.is_empty() {
            EMPTY_DUPLICATE_BYTES
        } else {
            resource.len()
        };
        self.charge(len)?;

        let mut copy = Vec::new();
        copy.try_reserve_exact(len)
            .map_err(|_: TryReserveError| FaultError::OutOfMemory {
                requested: len as u64,
                total: self.bytes - len as u64,
            })?;
        if resource.is_empty() {
            copy.resize(len, 0);
        } else {
            copy.extend_from_slice(&resource.bytes);
        }
        self.duplicates.push(copy);
        Ok(())
    }

    fn megabytes(&self) -> f64 {
        self.bytes as f64 / MIB
    }

    /// Releases every loaded resource independently. Returns the number of
    /// failed releases.
    fn release_all(&mut self, source: &dyn ResourceSource, telemetry: &dyn ITelemetryService) -> usize {
        let mut failures = 0;
        for resource in self.loaded.drain(..) {
            let key = resource.key.clone();
            if let Err(e) = source.release(resource) {
                failures += 1;
                warn!("{}", marker(format_args!("RELEASE_FAIL::{key}::{}:{e}", e.kind())));
                telemetry.add_breadcrumb(
                    &Breadcrumb::warning("Failed to release flood resource")
                        .with_category(BREADCRUMB_CATEGORY)
                        .with_data("location", &key)
                        .with_data("exception_type", e.kind()),
                );
            }
        }
        self.duplicates.clear();
        self.bytes = 0;
        failures
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Result of a flood invocation that returned normally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FloodOutcome {
    /// Another flood on this runner was in progress
    AlreadyRunning,
    /// Nothing registered under the label
    NoLocations,
    /// All passes ran
    Completed { loads: usize, passes: usize },
    /// A non-OOM failure was logged and swallowed
    Failed { kind: String, message: String },
}

enum FloodError {
    OutOfMemory(FaultError),
    Resource(ResourceError),
}

/// One flood in progress
///
/// Dropping the scope releases the arena, clears the in-progress flag and
/// logs `END`, whether the flood returned, raised or unwound.
struct FloodScope<'a> {
    runner: &'a FloodRunner,
    arena: FloodArena,
}

impl<'a> FloodScope<'a> {
    fn enter(runner: &'a FloodRunner) -> Option<Self> {
        runner
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                runner,
                arena: FloodArena::new(runner.memory_budget),
            })
    }
}

impl Drop for FloodScope<'_> {
    fn drop(&mut self) {
        self.arena
            .release_all(self.runner.source.as_ref(), self.runner.telemetry.as_ref());
        self.runner.active.store(false, Ordering::Release);
        info!("{}", marker("END"));
    }
}

/// Runs asset floods against a [`ResourceSource`]
pub struct FloodRunner {
    active: AtomicBool,
    source: Arc<dyn ResourceSource>,
    telemetry: Arc<dyn ITelemetryService>,
    label: String,
    memory_budget: Option<u64>,
}

impl FloodRunner {
    pub fn new(source: Arc<dyn ResourceSource>, telemetry: Arc<dyn ITelemetryService>) -> Self {
        Self {
            active: AtomicBool::new(false),
            source,
            telemetry,
            label: DEFAULT_FLOOD_LABEL.to_string(),
            memory_budget: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Caps the arena at `bytes`; going over is treated as out of memory.
    pub fn with_memory_budget(mut self, bytes: Option<u64>) -> Self {
        self.memory_budget = bytes;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether a flood is currently in progress on this runner.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn breadcrumb(&self, crumb: Breadcrumb) {
        self.telemetry
            .add_breadcrumb(&crumb.with_category(BREADCRUMB_CATEGORY));
    }

    /// Runs one flood.
    ///
    /// With `force_oom` the passes repeat until memory runs out; the
    /// resulting [`FaultError::OutOfMemory`] is raised after cleanup.
    /// Without it a single pass runs and nothing is duplicated.
    pub fn run(&self, force_oom: bool) -> FloodOutcome {
        let Some(mut scope) = FloodScope::enter(self) else {
            warn!("{}", marker("RUNNING"));
            self.breadcrumb(Breadcrumb::warning("Asset bundle flood already running"));
            return FloodOutcome::AlreadyRunning;
        };

        self.breadcrumb(
            Breadcrumb::info("Asset bundle flood requested").with_data("force_oom", force_oom),
        );

        let result = match self.flood(&mut scope.arena, force_oom) {
            Ok(outcome) => Ok(outcome),
            Err(FloodError::OutOfMemory(fault)) => {
                error!("{}", marker("OOM"));
                self.breadcrumb(
                    Breadcrumb::error("Asset bundle flood triggered out of memory")
                        .with_data("exception_message", &fault),
                );
                Err(fault)
            }
            Err(FloodError::Resource(e)) => {
                error!("{}", marker(format_args!("ERROR::{}:{e}", e.kind())));
                self.breadcrumb(
                    Breadcrumb::error("Asset bundle flood failed")
                        .with_data("exception_type", e.kind())
                        .with_data("exception_message", &e),
                );
                Ok(FloodOutcome::Failed {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                })
            }
        };

        drop(scope);

        match result {
            Ok(outcome) => outcome,
            Err(fault) => fault.raise(),
        }
    }

    fn flood(&self, arena: &mut FloodArena, force_oom: bool) -> Result<FloodOutcome, FloodError> {
        let locations = self
            .source
            .locations(&self.label)
            .map_err(FloodError::Resource)?;

        if locations.is_empty() {
            warn!("{}", marker(format_args!("NO_LOCATIONS::{}", self.label)));
            self.breadcrumb(
                Breadcrumb::warning("No resources registered for flood")
                    .with_data("label", &self.label),
            );
            return Ok(FloodOutcome::NoLocations);
        }

        let mut loads = 0usize;
        let mut passes = 0usize;
        loop {
            passes += 1;
            let loads_before = loads;

            for key in &locations {
                let resource = match self.source.load(key) {
                    Ok(resource) => resource,
                    Err(e) => {
                        warn!("{}", marker(format_args!("LOAD_FAIL::{key}")));
                        self.breadcrumb(
                            Breadcrumb::warning("Resource load failed")
                                .with_data("location", key)
                                .with_data("exception_type", e.kind()),
                        );
                        continue;
                    }
                };

                let duplicate = if force_oom {
                    arena.duplicate(&resource)
                } else {
                    Ok(())
                };

                if let Err((resource, fault)) = arena.keep(resource) {
                    if let Err(e) = self.source.release(resource) {
                        warn!("{}", marker(format_args!("RELEASE_FAIL::{key}::{}:{e}", e.kind())));
                    }
                    return Err(FloodError::OutOfMemory(fault));
                }
                loads += 1;
                duplicate.map_err(FloodError::OutOfMemory)?;
            }

            info!(
                "{}",
                marker(format_args!(
                    "PASS::{passes}::loaded={loads}::mem={:.1}MB",
                    arena.megabytes()
                ))
            );
            self.breadcrumb(
                Breadcrumb::info("Asset bundle flood pass complete")
                    .with_data("pass", passes)
                    .with_data("success_loads", loads)
                    .with_data("allocated_mb", format!("{:.1}", arena.megabytes())),
            );

            // A pass that loads nothing cannot grow memory; stop instead of spinning.
            if !force_oom || loads == loads_before {
                break;
            }
        }

        info!("{}", marker(format_args!("COMPLETE::loads={loads}::passes={passes}")));
        self.breadcrumb(
            Breadcrumb::info("Asset bundle flood finished")
                .with_data("loads", loads)
                .with_data("passes", passes),
        );
        Ok(FloodOutcome::Completed { loads, passes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_source_lists_sorted_relative_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("flood");
        std::fs::create_dir_all(base.join("textures")).unwrap();
        std::fs::write(base.join("b.bin"), b"bb").unwrap();
        std::fs::write(base.join("a.bin"), b"a").unwrap();
        std::fs::write(base.join("textures").join("t.png"), b"ttt").unwrap();

        let source = DirectoryResourceSource::new(tmp.path());
        let keys: Vec<String> = source
            .locations("flood")
            .unwrap()
            .into_iter()
            .map(|k| k.as_str().to_string())
            .collect();
        assert_eq!(keys, vec!["flood/a.bin", "flood/b.bin", "flood/textures/t.png"]);
    }

    #[test]
    fn test_directory_source_missing_label_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let source = DirectoryResourceSource::new(tmp.path());
        assert!(source.locations("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_directory_source_load_and_release() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("l")).unwrap();
        std::fs::write(tmp.path().join("l").join("x"), b"abc").unwrap();

        let source = DirectoryResourceSource::new(tmp.path());
        let resource = source.load(&ResourceKey::new("l/x")).unwrap();
        assert_eq!(resource.bytes, b"abc");
        assert_eq!(
            resource.digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(source.outstanding(), 1);
        source.release(resource).unwrap();
        assert_eq!(source.outstanding(), 0);

        assert!(matches!(
            source.load(&ResourceKey::new("l/missing")),
            Err(ResourceError::NotFound(_))
        ));
    }

    #[test]
    fn test_arena_budget() {
        let mut arena = FloodArena::new(Some(10));
        let r = Resource::new(ResourceKey::new("k"), vec![0; 6]);
        arena.duplicate(&r).unwrap();
        let err = arena.duplicate(&r).unwrap_err();
        assert!(matches!(
            err,
            FaultError::OutOfMemory {
                requested: 6,
                total: 6
            }
        ));
    }

    #[test]
    fn test_empty_resource_duplicates_placeholder() {
        let mut arena = FloodArena::new(None);
        arena
            .duplicate(&Resource::new(ResourceKey::new("e"), Vec::new()))
            .unwrap();
        assert_eq!(arena.bytes, EMPTY_DUPLICATE_BYTES as u64);
    }

    #[test]
    fn test_guard_rejects_reentry_and_clears() {
        let flag = AtomicBool::new(false);
        let guard = ActiveGuard::acquire(&flag).unwrap();
        assert!(ActiveGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(ActiveGuard::acquire(&flag).is_some());
    }
}
