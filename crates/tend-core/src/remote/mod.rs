//! Remote collection gateway
//!
//! The server is reached through a uniform REST shape per collection:
//! `POST /{collection}` (idempotent on `client_id`), `GET /{collection}`,
//! `PUT /{collection}/{id}` and `DELETE /{collection}/{id}`.

mod http;
mod memory;

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CollectionItem, Record, RecordId};
use crate::util::today;

pub use http::HttpGateway;
pub use memory::{MemoryGateway, Operation};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote sync is not configured")]
    NotConfigured,
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Remote store is unreachable")]
    Offline,
}

impl RemoteError {
    /// Whether the failure only means "no network right now".
    pub fn is_offline(&self) -> bool {
        match self {
            Self::NotConfigured | Self::Offline => true,
            Self::Http(error) => error.is_connect() || error.is_timeout(),
            _ => false,
        }
    }
}

/// Wire representation of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord<T> {
    pub client_id: RecordId,
    #[serde(flatten)]
    pub fields: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl<T: CollectionItem> RemoteRecord<T> {
    /// Request body for pushing a local record.
    pub fn from_record(record: &Record<T>) -> Self {
        Self {
            client_id: record.id.clone(),
            fields: record.fields.clone(),
            date: Some(record.date),
            timestamp: Some(record.timestamp),
        }
    }

    /// Convert a server record into an acknowledged local record.
    ///
    /// Fields the server omitted fall back to the local copy with the same id.
    pub fn into_record(self, local: Option<&Record<T>>) -> Record<T> {
        let date = self
            .date
            .or_else(|| local.map(|record| record.date))
            .unwrap_or_else(today);
        let timestamp = self
            .timestamp
            .or_else(|| local.map(|record| record.timestamp))
            .unwrap_or_default();

        Record {
            id: self.client_id,
            date,
            timestamp,
            synced: true,
            fields: self.fields,
        }
    }
}

/// Client-side contract of the remote store for one collection.
pub trait RemoteGateway<T: CollectionItem>: Send + Sync + 'static {
    /// Store `record`; replaying the same `client_id` must not duplicate it.
    fn create(
        &self,
        record: &RemoteRecord<T>,
    ) -> impl Future<Output = Result<RemoteRecord<T>, RemoteError>> + Send;

    /// Authoritative snapshot of the collection.
    fn list(&self) -> impl Future<Output = Result<Vec<RemoteRecord<T>>, RemoteError>> + Send;

    /// Apply a partial update to the record with `id`.
    fn update(
        &self,
        id: &RecordId,
        patch: &T::Patch,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Remove the record with `id`; a missing record is not an error.
    fn delete(&self, id: &RecordId) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CalorieEntry;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_shape_uses_client_id() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let record = Record::new(CalorieEntry::new("Soup", 90), date);
        let value = serde_json::to_value(RemoteRecord::from_record(&record)).unwrap();

        assert_eq!(value["client_id"], record.id.as_str());
        assert_eq!(value["food"], "Soup");
        assert_eq!(value["calories"], 90);
        assert_eq!(value["date"], "2024-01-03");
        assert!(value.get("synced").is_none());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_into_record_falls_back_to_local_metadata() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let local = Record::new(CalorieEntry::new("Soup", 90), date);
        let remote: RemoteRecord<CalorieEntry> = serde_json::from_value(serde_json::json!({
            "client_id": local.id.as_str(),
            "food": "Soup (large)",
            "calories": 180,
            "server_only": true
        }))
        .unwrap();

        let merged = remote.into_record(Some(&local));
        assert_eq!(merged.id, local.id);
        assert_eq!(merged.date, local.date);
        assert_eq!(merged.timestamp, local.timestamp);
        assert!(merged.synced);
        assert_eq!(merged.fields, CalorieEntry::new("Soup (large)", 180));
    }

    #[test]
    fn test_offline_classification() {
        assert!(RemoteError::NotConfigured.is_offline());
        assert!(RemoteError::Offline.is_offline());
        assert!(!RemoteError::Api("boom (500)".to_string()).is_offline());
    }
}
