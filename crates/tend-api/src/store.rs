//! In-memory record storage behind the REST routes

use std::collections::HashMap;

use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::AppError;

/// A stored record: `client_id` plus whatever fields the client sent.
pub type StoredRecord = Map<String, Value>;

const CLIENT_ID: &str = "client_id";

/// Collections served under `/{collection}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Calories,
    Workouts,
    Accounts,
}

impl Collection {
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "calories" => Some(Self::Calories),
            "workouts" => Some(Self::Workouts),
            "accounts" => Some(Self::Accounts),
            _ => None,
        }
    }

    pub const fn segment(self) -> &'static str {
        match self {
            Self::Calories => "calories",
            Self::Workouts => "workouts",
            Self::Accounts => "accounts",
        }
    }
}

/// Result of a create: the first write of an id or a replay of it.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(StoredRecord),
    Replayed(StoredRecord),
}

#[derive(Debug)]
pub struct RecordStore {
    collections: RwLock<HashMap<Collection, Vec<StoredRecord>>>,
    max_records: usize,
}

impl RecordStore {
    pub fn new(max_records: usize) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            max_records,
        }
    }

    /// Store a record keyed by its `client_id`.
    ///
    /// Replaying a known `client_id` replaces that record's fields instead of
    /// adding a second one.
    pub async fn create(
        &self,
        collection: Collection,
        body: Value,
    ) -> Result<CreateOutcome, AppError> {
        let Value::Object(mut fields) = body else {
            return Err(AppError::bad_request("record body must be a JSON object"));
        };
        let client_id = fields
            .get(CLIENT_ID)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| AppError::bad_request("client_id is required"))?;
        fields.insert(CLIENT_ID.to_string(), Value::String(client_id.clone()));
        fields.remove("synced");

        let mut collections = self.collections.write().await;
        let records = collections.entry(collection).or_default();
        if let Some(existing) = records
            .iter_mut()
            .find(|record| record_id(record) == Some(client_id.as_str()))
        {
            existing.clone_from(&fields);
            return Ok(CreateOutcome::Replayed(fields));
        }

        if records.len() >= self.max_records {
            return Err(AppError::bad_request(format!(
                "collection {} is full ({} records)",
                collection.segment(),
                self.max_records
            )));
        }
        records.push(fields.clone());
        Ok(CreateOutcome::Created(fields))
    }

    pub async fn list(&self, collection: Collection) -> Vec<StoredRecord> {
        self.collections
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Shallow-merge the non-null fields of `patch` into the stored record.
    pub async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<StoredRecord, AppError> {
        let Value::Object(patch) = patch else {
            return Err(AppError::bad_request("patch body must be a JSON object"));
        };

        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|record| record_id(record) == Some(id)))
            .ok_or_else(|| {
                AppError::not_found(format!("{} record {id}", collection.segment()))
            })?;

        for (key, value) in patch {
            if key == CLIENT_ID || key == "synced" || value.is_null() {
                continue;
            }
            record.insert(key, value);
        }
        Ok(record.clone())
    }

    /// Remove the record; returns whether it existed.
    pub async fn delete(&self, collection: Collection, id: &str) -> bool {
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(&collection) else {
            return false;
        };
        let before = records.len();
        records.retain(|record| record_id(record) != Some(id));
        records.len() != before
    }

    /// Number of records across every collection.
    pub async fn total(&self) -> usize {
        self.collections.read().await.values().map(Vec::len).sum()
    }
}

fn record_id(record: &StoredRecord) -> Option<&str> {
    record.get(CLIENT_ID).and_then(Value::as_str)
}
