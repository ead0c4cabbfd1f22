//! Telemetry router
//!
//! Owns the compiled backend and is the only way the rest of the harness
//! talks to it. The router:
//! - initializes the backend at most once per process
//! - catches backend panics and turns them into warnings
//! - keeps the current [`TelemetryMetadata`] and applies runtime updates
//! - provides the [`TelemetryLayer`] that mirrors log events into `on_log`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crashlab_core::config::Config;
use crashlab_core::domain::{MetadataUpdate, TelemetryMetadata, MARKER_NAMESPACE};
use crashlab_core::ports::{Breadcrumb, IKeyValueStore, ITelemetryService, LogLevel};

use crate::backends::compiled_backend;
use crate::guard::best_effort;
use crate::layer::TelemetryLayer;

/// Single entry point to the compiled telemetry backend
pub struct TelemetryRouter {
    backend: Arc<dyn ITelemetryService>,
    initialized: AtomicBool,
    metadata: Mutex<Option<TelemetryMetadata>>,
}

impl TelemetryRouter {
    /// Wraps an explicit backend.
    pub fn new(backend: Arc<dyn ITelemetryService>) -> Self {
        Self {
            backend,
            initialized: AtomicBool::new(false),
            metadata: Mutex::new(None),
        }
    }

    /// Wraps the backend selected at compile time.
    pub fn compiled(config: &Config) -> Self {
        Self::new(compiled_backend(config))
    }

    /// Initializes the backend with `metadata`.
    ///
    /// Returns `false` if the router was already initialized; the call is
    /// then ignored.
    pub fn start(&self, metadata: TelemetryMetadata) -> bool {
        if self.initialized.swap(true, Ordering::AcqRel) {
            debug!("Telemetry already initialized; ignoring");
            return false;
        }

        best_effort(self.backend.name(), "initialize", || {
            self.backend.initialize(
                &metadata.user_id,
                &metadata,
                &metadata.release,
                &metadata.environment,
            )
        });
        let run_id = metadata.run_id.clone();
        *self.lock_metadata() = Some(metadata);
        info!("{MARKER_NAMESPACE}::INIT::run_id={run_id}");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Backend name as reported in metadata.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Metadata the backend was initialized with, including applied updates.
    pub fn metadata(&self) -> Option<TelemetryMetadata> {
        self.lock_metadata().clone()
    }

    /// Layer mirroring log events into this router.
    pub fn layer(self: &Arc<Self>) -> TelemetryLayer {
        TelemetryLayer::new(self.clone())
    }

    /// Applies a partial metadata update.
    ///
    /// The in-memory metadata is updated, every set field is persisted to
    /// `store`, and the backend receives the new metadata when initialized.
    /// Persistence failures are logged and do not stop the update.
    pub fn apply_metadata_update(
        &self,
        update: &MetadataUpdate,
        store: &dyn IKeyValueStore,
    ) -> Option<TelemetryMetadata> {
        let current = {
            let mut guard = self.lock_metadata();
            if let Some(metadata) = guard.as_mut() {
                update.apply_to(metadata);
            }
            guard.clone()
        };

        if let Err(e) = update.persist(store) {
            warn!("Failed to persist metadata: {e}");
        }

        if let Some(metadata) = &current {
            self.apply_metadata(metadata);
        }
        info!("{MARKER_NAMESPACE}::META::APPLIED::{}", self.backend.name());
        current
    }

    fn lock_metadata(&self) -> MutexGuard<'_, Option<TelemetryMetadata>> {
        self.metadata.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The router is itself a telemetry service, so callers holding an
/// `Arc<dyn ITelemetryService>` get panic isolation for free.
impl ITelemetryService for TelemetryRouter {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    fn initialize(&self, user_id: &str, metadata: &TelemetryMetadata, release: &str, environment: &str) {
        let mut metadata = metadata.clone();
        metadata.user_id = user_id.to_string();
        metadata.release = release.to_string();
        metadata.environment = environment.to_string();
        self.start(metadata);
    }

    fn on_log(&self, message: &str, stack_trace: Option<&str>, level: LogLevel) {
        best_effort(self.backend.name(), "on_log", || {
            self.backend.on_log(message, stack_trace, level)
        });
    }

    fn ensure_session(&self, reason: Option<&str>) {
        best_effort(self.backend.name(), "ensure_session", || {
            self.backend.ensure_session(reason)
        });
    }

    fn apply_metadata(&self, metadata: &TelemetryMetadata) {
        best_effort(self.backend.name(), "apply_metadata", || {
            self.backend.apply_metadata(metadata)
        });
    }

    fn add_breadcrumb(&self, breadcrumb: &Breadcrumb) {
        best_effort(self.backend.name(), "add_breadcrumb", || {
            self.backend.add_breadcrumb(breadcrumb)
        });
    }

    fn record_native_crash(&self, action: &str, fault: &str) {
        best_effort(self.backend.name(), "record_native_crash", || {
            self.backend.record_native_crash(action, fault)
        });
    }
}
