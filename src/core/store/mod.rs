//! Dashboard preference stores: plain key/value bags (budget planner, chat,
//! user flags) loaded from and saved to a pluggable backend. Last write wins.

mod backend;

pub use backend::{MemoryBackend, SqliteBackend, StorageBackend};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const BUDGET_PLANNER: &str = "budget-planner";
pub const CHAT: &str = "chat";
pub const USER_FLAGS: &str = "user-flags";

pub const WELL_KNOWN_STORES: &[&str] = &[BUDGET_PLANNER, CHAT, USER_FLAGS];

pub type Entries = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store name '{0}': use lowercase letters, digits, '-' or '_'")]
    InvalidName(String),
    #[error("value for '{key}' has unexpected shape: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage backend failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

pub fn validate_store_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// In-memory view of one named store. Changes stay local until `save`.
pub struct PreferenceStore {
    name: String,
    entries: Entries,
    backend: Arc<dyn StorageBackend>,
}

impl PreferenceStore {
    pub async fn open(name: &str, backend: Arc<dyn StorageBackend>) -> Result<Self, StoreError> {
        validate_store_name(name)?;
        let entries = backend.load(name).await?;
        Ok(Self {
            name: name.to_string(),
            entries,
            backend,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.entries
            .get(key)
            .map(|v| {
                T::deserialize(v).map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn set_as<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let encoded = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.set(key, encoded);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub async fn save(&self) -> Result<(), StoreError> {
        self.backend.save(&self.name, &self.entries).await?;
        Ok(())
    }

    /// Drop every entry, locally and in the backend.
    pub async fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        self.backend.clear(&self.name).await?;
        Ok(())
    }
}
