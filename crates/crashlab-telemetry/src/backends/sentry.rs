//! Sentry backend
//!
//! Uses the `sentry` crate. The SDK's panic integration already reports
//! panics, so mirrored log lines only become breadcrumbs. Native faults get
//! a fatal event that is flushed before the signal is raised.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use sentry::protocol::{Map, Value};
use sentry::types::Dsn;
use tracing::{debug, info, warn};

use crashlab_core::config::SentryOptions;
use crashlab_core::domain::{TelemetryMetadata, MARKER_NAMESPACE};
use crashlab_core::ports::{Breadcrumb, BreadcrumbLevel, ITelemetryService, LogLevel};

/// Breadcrumb category for mirrored log lines.
const LOG_CATEGORY: &str = "crashlab.log";

/// How long a native fault waits for the transport before raising.
const NATIVE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Telemetry service backed by the Sentry SDK
pub struct SentryTelemetryService {
    options: SentryOptions,
    guard: Mutex<Option<sentry::ClientInitGuard>>,
}

impl SentryTelemetryService {
    pub fn new(options: SentryOptions) -> Self {
        Self {
            options,
            guard: Mutex::new(None),
        }
    }

    fn client_options(&self, release: &str, environment: &str) -> sentry::ClientOptions {
        let dsn = self.options.dsn.as_deref().and_then(|raw| {
            raw.parse::<Dsn>()
                .map_err(|e| warn!("Ignoring invalid Sentry DSN: {e}"))
                .ok()
        });

        sentry::ClientOptions {
            dsn,
            release: Some(release.to_string().into()),
            environment: Some(environment.to_string().into()),
            debug: self.options.debug,
            auto_session_tracking: self.options.auto_session_tracking,
            attach_stacktrace: self.options.attach_stacktrace,
            send_default_pii: self.options.send_default_pii,
            sample_rate: self.options.sample_rate,
            traces_sample_rate: self.options.traces_sample_rate,
            max_breadcrumbs: self.options.max_breadcrumbs,
            server_name: self.options.server_name.clone().map(Into::into),
            ..Default::default()
        }
    }

    fn configure_scope(user_id: &str, metadata: &TelemetryMetadata) {
        sentry::configure_scope(|scope| {
            scope.set_user(Some(sentry::User {
                id: Some(user_id.to_string()),
                ..Default::default()
            }));
            for (key, value) in metadata.iter() {
                scope.set_tag(key, value);
            }
        });
    }
}

fn is_bound() -> bool {
    sentry::Hub::current()
        .client()
        .is_some_and(|client| client.is_enabled())
}

fn sentry_level(level: BreadcrumbLevel) -> sentry::Level {
    match level {
        BreadcrumbLevel::Debug => sentry::Level::Debug,
        BreadcrumbLevel::Info => sentry::Level::Info,
        BreadcrumbLevel::Warning => sentry::Level::Warning,
        BreadcrumbLevel::Error => sentry::Level::Error,
    }
}

impl ITelemetryService for SentryTelemetryService {
    fn name(&self) -> &'static str {
        "sentry"
    }

    fn initialize(&self, user_id: &str, metadata: &TelemetryMetadata, release: &str, environment: &str) {
        if is_bound() {
            info!("{MARKER_NAMESPACE}::SENTRY::already_initialized (using existing settings)");
        } else {
            let guard = sentry::init(self.client_options(release, environment));
            if guard.is_enabled() {
                info!("{MARKER_NAMESPACE}::SENTRY::initialized");
            } else {
                warn!("Sentry client disabled: no usable DSN configured");
            }
            *self.guard.lock().unwrap_or_else(PoisonError::into_inner) = Some(guard);
        }

        Self::configure_scope(user_id, metadata);
        sentry::add_breadcrumb(sentry::Breadcrumb {
            category: Some(Breadcrumb::DEFAULT_CATEGORY.to_string()),
            message: Some(format!("CrashLab init run_id={}", metadata.run_id)),
            level: sentry::Level::Info,
            ..Default::default()
        });
    }

    fn on_log(&self, message: &str, stack_trace: Option<&str>, level: LogLevel) {
        let mut data = Map::new();
        if let Some(trace) = stack_trace {
            data.insert("stack_trace".to_string(), Value::from(trace));
        }
        sentry::add_breadcrumb(sentry::Breadcrumb {
            category: Some(LOG_CATEGORY.to_string()),
            message: Some(message.to_string()),
            level: sentry_level(level.breadcrumb_level()),
            data,
            ..Default::default()
        });
    }

    fn ensure_session(&self, reason: Option<&str>) {
        if !is_bound() {
            debug!("No Sentry client bound; skipping session start");
            return;
        }
        sentry::start_session();
        debug!("Sentry session started ({})", reason.unwrap_or("unspecified"));
    }

    fn apply_metadata(&self, metadata: &TelemetryMetadata) {
        Self::configure_scope(&metadata.user_id, metadata);
    }

    fn record_native_crash(&self, action: &str, fault: &str) {
        let Some(client) = sentry::Hub::current().client() else {
            return;
        };
        sentry::with_scope(
            |scope| scope.set_tag("crashlab.action", action),
            || sentry::capture_message(&format!("Native fault: {fault}"), sentry::Level::Fatal),
        );
        if !client.flush(Some(NATIVE_FLUSH_TIMEOUT)) {
            warn!("Sentry transport did not flush before {action}");
        }
    }

    fn add_breadcrumb(&self, breadcrumb: &Breadcrumb) {
        sentry::add_breadcrumb(sentry::Breadcrumb {
            category: Some(breadcrumb.category.clone()),
            message: Some(breadcrumb.message.clone()),
            level: sentry_level(breadcrumb.level),
            data: breadcrumb
                .data
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect(),
            ..Default::default()
        });
    }
}
