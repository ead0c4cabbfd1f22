//! Telemetry metadata
//!
//! The metadata is resolved once at process start from environment variables
//! (with fallbacks) and attached to the active backend as tags / custom keys.
//! Afterwards it only changes through an explicit [`MetadataUpdate`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::CrashlabError;
use super::flavor::Flavor;
use crate::ports::IKeyValueStore;

/// Prefs key holding the persistent user id.
pub const PREF_USER_ID: &str = "crashlab_user_id";
/// Prefs key holding the last applied run id.
pub const PREF_RUN_ID: &str = "crashlab_run_id";
/// Prefs key holding the last applied environment.
pub const PREF_ENVIRONMENT: &str = "crashlab_environment";
/// Prefs key holding the last applied commit sha.
pub const PREF_COMMIT_SHA: &str = "crashlab_commit_sha";
/// Prefs key holding the last applied build number.
pub const PREF_BUILD_NUMBER: &str = "crashlab_build_number";
/// Prefs key holding the last applied dev-mode flag.
pub const PREF_DEV_MODE: &str = "crashlab_dev_mode";
/// Prefs key holding the last applied server name.
pub const PREF_SERVER_NAME: &str = "crashlab_server_name";

/// Metadata attached to every telemetry session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryMetadata {
    pub run_id: String,
    pub release: String,
    pub environment: String,
    pub backend: String,
    pub platform: String,
    pub commit_sha: String,
    pub build_number: String,
    pub dev_mode: String,
    pub ci: String,
    pub server_name: String,
    pub user_id: String,
    pub app_start_ts: String,
}

impl TelemetryMetadata {
    /// Resolve metadata from `lookup` (normally the process environment).
    ///
    /// Empty values count as missing. The user id falls back to the value
    /// persisted in `store`, creating and saving one on first run.
    pub fn resolve<F>(lookup: F, store: &dyn IKeyValueStore, flavor: Flavor) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, fallback: &dyn Fn() -> String| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(fallback)
        };

        Self {
            run_id: get("RUN_ID", &|| Uuid::new_v4().simple().to_string()),
            release: get("RELEASE_NAME", &|| env!("CARGO_PKG_VERSION").to_string()),
            environment: get("ENVIRONMENT", &|| "dev".to_string()),
            backend: flavor.backend_name().to_string(),
            platform: std::env::consts::OS.to_string(),
            commit_sha: get("COMMIT_SHA", &|| "local".to_string()),
            build_number: get("BUILD_NUMBER", &|| "1".to_string()),
            dev_mode: get("DEV_MODE", &|| default_dev_mode().to_string()),
            ci: get("CI", &|| "false".to_string()),
            server_name: get("SERVER_NAME", &host_name),
            user_id: get("USER_ID", &|| load_or_create_user_id(store)),
            app_start_ts: Utc::now().to_rfc3339(),
        }
    }

    /// Resolve metadata from the real process environment.
    pub fn from_env(store: &dyn IKeyValueStore, flavor: Flavor) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), store, flavor)
    }

    /// Key/value pairs in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("run_id", self.run_id.as_str()),
            ("release", self.release.as_str()),
            ("environment", self.environment.as_str()),
            ("backend", self.backend.as_str()),
            ("platform", self.platform.as_str()),
            ("commit_sha", self.commit_sha.as_str()),
            ("build_number", self.build_number.as_str()),
            ("dev_mode", self.dev_mode.as_str()),
            ("ci", self.ci.as_str()),
            ("server_name", self.server_name.as_str()),
            ("user_id", self.user_id.as_str()),
            ("app_start_ts", self.app_start_ts.as_str()),
        ]
        .into_iter()
    }

    /// Renders `k=v` pairs joined with `,` as used by the `CRASHLAB::META` marker.
    pub fn to_kvp_string(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Loads the persistent user id, creating one on first use.
pub fn load_or_create_user_id(store: &dyn IKeyValueStore) -> String {
    if let Some(id) = store.get(PREF_USER_ID) {
        return id;
    }
    let id = Uuid::new_v4().simple().to_string();
    store.set(PREF_USER_ID, &id);
    if let Err(e) = store.save() {
        tracing::warn!("Failed to persist user id: {e}");
    }
    id
}

/// Best-effort machine name used for `server_name`.
pub fn host_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn default_dev_mode() -> &'static str {
    if cfg!(debug_assertions) {
        "true"
    } else {
        "false"
    }
}

fn timestamp_run_id() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Partial metadata update applied at runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataUpdate {
    pub user_id: Option<String>,
    pub run_id: Option<String>,
    pub environment: Option<String>,
    pub commit_sha: Option<String>,
    pub build_number: Option<String>,
    pub dev_mode: Option<String>,
    pub server_name: Option<String>,
}

impl MetadataUpdate {
    /// Returns `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 7] {
        [
            (PREF_USER_ID, &self.user_id),
            (PREF_RUN_ID, &self.run_id),
            (PREF_ENVIRONMENT, &self.environment),
            (PREF_COMMIT_SHA, &self.commit_sha),
            (PREF_BUILD_NUMBER, &self.build_number),
            (PREF_DEV_MODE, &self.dev_mode),
            (PREF_SERVER_NAME, &self.server_name),
        ]
    }

    /// Overwrite the matching fields of `metadata`.
    pub fn apply_to(&self, metadata: &mut TelemetryMetadata) {
        let targets = [
            (&self.user_id, &mut metadata.user_id),
            (&self.run_id, &mut metadata.run_id),
            (&self.environment, &mut metadata.environment),
            (&self.commit_sha, &mut metadata.commit_sha),
            (&self.build_number, &mut metadata.build_number),
            (&self.dev_mode, &mut metadata.dev_mode),
            (&self.server_name, &mut metadata.server_name),
        ];
        for (value, slot) in targets {
            if let Some(v) = value {
                slot.clone_from(v);
            }
        }
    }

    /// Persist every set field under its `crashlab_*` prefs key and save.
    pub fn persist(&self, store: &dyn IKeyValueStore) -> Result<(), CrashlabError> {
        for (key, value) in self.fields() {
            if let Some(v) = value {
                store.set(key, v);
            }
        }
        store.save()
    }

    /// Values previously applied and saved, with the documented defaults
    /// for anything never saved.
    ///
    /// The user id has no stable default: it stays `None` until a session
    /// generates and saves one.
    pub fn load_saved(store: &dyn IKeyValueStore) -> Self {
        let saved = |key: &str, fallback: &dyn Fn() -> String| {
            Some(store.get(key).unwrap_or_else(fallback))
        };
        Self {
            user_id: store.get(PREF_USER_ID),
            run_id: saved(PREF_RUN_ID, &timestamp_run_id),
            environment: saved(PREF_ENVIRONMENT, &|| "dev".to_string()),
            commit_sha: saved(PREF_COMMIT_SHA, &|| "local".to_string()),
            build_number: saved(PREF_BUILD_NUMBER, &|| "1".to_string()),
            dev_mode: saved(PREF_DEV_MODE, &|| default_dev_mode().to_string()),
            server_name: saved(PREF_SERVER_NAME, &host_name),
        }
    }

    /// Default values for every field except the user id.
    pub fn reset_defaults() -> Self {
        Self {
            user_id: None,
            run_id: Some(timestamp_run_id()),
            environment: Some("dev".to_string()),
            commit_sha: Some("local".to_string()),
            build_number: Some("1".to_string()),
            dev_mode: Some(default_dev_mode().to_string()),
            server_name: Some(host_name()),
        }
    }
}
