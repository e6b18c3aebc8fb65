//! Local persistence for synced collections
//!
//! Every collection is stored as one JSON array blob under its own key. The
//! blob is rewritten wholesale on each mutation; there is no append log.

mod memory;
mod migrations;
mod sqlite;

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{CollectionItem, Record, RecordId};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Suffix of the key holding ids whose remote delete is still outstanding.
const TOMBSTONE_SUFFIX: &str = ".tombstones";

/// Durable string blobs addressed by key.
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the blob stored under `key`
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the blob stored under `key` (missing keys are not an error)
    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed view of one collection inside a [`KeyValueStore`].
pub struct LocalStore<T> {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for LocalStore<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            key: self.key.clone(),
            _item: PhantomData,
        }
    }
}

impl<T: CollectionItem> LocalStore<T> {
    /// Store the collection under its default key.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            key: T::STORAGE_KEY.to_string(),
            _item: PhantomData,
        }
    }

    /// Store the collection under a key scoped to `namespace` (e.g. a user id).
    pub fn with_namespace(backend: Arc<dyn KeyValueStore>, namespace: &str) -> Self {
        Self {
            backend,
            key: format!("{namespace}:{}", T::STORAGE_KEY),
            _item: PhantomData,
        }
    }

    /// Key of the collection blob.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted collection.
    ///
    /// A missing, unreadable or corrupt blob yields an empty collection.
    pub fn load(&self) -> Vec<Record<T>> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                tracing::warn!(key = %self.key, "Failed to read local collection: {error}");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Record<T>>>(&raw) {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(
                    key = %self.key,
                    "Discarding corrupt local collection: {error}"
                );
                Vec::new()
            }
        }
    }

    /// Persist the full collection.
    pub fn save(&self, records: &[Record<T>]) -> Result<()> {
        let raw = serde_json::to_string(records)?;
        self.backend.put(&self.key, &raw)
    }

    /// Ids whose remote delete has not been confirmed yet.
    pub fn load_tombstones(&self) -> Vec<RecordId> {
        let key = self.tombstone_key();
        match self.backend.get(&key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!(key = %key, "Discarding corrupt tombstone list: {error}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(error) => {
                tracing::warn!(key = %key, "Failed to read tombstone list: {error}");
                Vec::new()
            }
        }
    }

    /// Persist the outstanding delete list; an empty list removes the key.
    pub fn save_tombstones(&self, ids: &[RecordId]) -> Result<()> {
        let key = self.tombstone_key();
        if ids.is_empty() {
            return self.backend.remove(&key);
        }
        let raw = serde_json::to_string(ids)?;
        self.backend.put(&key, &raw)
    }

    fn tombstone_key(&self) -> String {
        format!("{}{TOMBSTONE_SUFFIX}", self.key)
    }
}
