//! Durable key-value storage port
//!
//! Mirrors the "player prefs" model: reads and writes hit an in-memory view,
//! and `save` flushes it to durable storage. There is no concurrent-writer
//! protection beyond what the implementation's interior lock provides.

use crate::domain::CrashlabError;

/// Port trait for small string settings that must survive a restart
pub trait IKeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key` (not durable until [`save`](Self::save)).
    fn set(&self, key: &str, value: &str);

    /// Removes `key` (not durable until [`save`](Self::save)).
    fn delete(&self, key: &str);

    /// Returns `true` if `key` holds a value.
    fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Flushes pending changes to durable storage.
    fn save(&self) -> Result<(), CrashlabError>;
}
