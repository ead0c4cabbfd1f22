//! Collaborators a fault procedure may reach for

use std::sync::Arc;

use crashlab_core::config::{Config, FaultsConfig};
use crashlab_core::ports::{IKeyValueStore, ITelemetryService};

use crate::flood::{DirectoryResourceSource, FloodRunner};
use crate::providers::{platform_native_provider, HangProvider, NativeFaultProvider, ThreadSleepHang};

const MIB: u64 = 1024 * 1024;

/// Everything the catalog needs besides the action key
///
/// Built once per process. Tests swap the platform providers for fakes with
/// the `with_*` methods.
pub struct FaultContext {
    faults: FaultsConfig,
    native: Arc<dyn NativeFaultProvider>,
    hang: Arc<dyn HangProvider>,
    flood: Arc<FloodRunner>,
    store: Arc<dyn IKeyValueStore>,
    telemetry: Arc<dyn ITelemetryService>,
}

impl FaultContext {
    /// Context with the real providers for the current platform.
    pub fn new(
        config: &Config,
        store: Arc<dyn IKeyValueStore>,
        telemetry: Arc<dyn ITelemetryService>,
    ) -> Self {
        let source = Arc::new(DirectoryResourceSource::new(config.flood.assets_dir.clone()));
        let flood = FloodRunner::new(source, telemetry.clone())
            .with_label(config.flood.label.clone())
            .with_memory_budget(config.flood.memory_budget_mb.map(|mb| mb * MIB));

        Self {
            faults: config.faults.clone(),
            native: platform_native_provider(),
            hang: Arc::new(ThreadSleepHang),
            flood: Arc::new(flood),
            store,
            telemetry,
        }
    }

    pub fn with_native_provider(mut self, native: Arc<dyn NativeFaultProvider>) -> Self {
        self.native = native;
        self
    }

    pub fn with_hang_provider(mut self, hang: Arc<dyn HangProvider>) -> Self {
        self.hang = hang;
        self
    }

    pub fn with_flood_runner(mut self, flood: Arc<FloodRunner>) -> Self {
        self.flood = flood;
        self
    }

    pub fn with_faults_config(mut self, faults: FaultsConfig) -> Self {
        self.faults = faults;
        self
    }

    pub fn faults(&self) -> &FaultsConfig {
        &self.faults
    }

    pub fn native(&self) -> &dyn NativeFaultProvider {
        self.native.as_ref()
    }

    pub fn hang(&self) -> &dyn HangProvider {
        self.hang.as_ref()
    }

    pub fn flood(&self) -> &FloodRunner {
        &self.flood
    }

    pub fn store(&self) -> &dyn IKeyValueStore {
        self.store.as_ref()
    }

    pub fn telemetry(&self) -> &dyn ITelemetryService {
        self.telemetry.as_ref()
    }
}
