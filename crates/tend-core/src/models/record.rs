//! Record envelope shared by every synced collection

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::now_millis;

/// Length of the random suffix appended to generated ids.
const ID_SUFFIX_LEN: usize = 9;

/// Client-generated identifier of a record.
///
/// Minted once on the device and never changed afterwards. The same value is
/// sent to the server as `client_id` and acts as the idempotency key for every
/// remote operation on the record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a new id of the form `<unix-millis>-<random hex>`.
    #[must_use]
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", now_millis(), &suffix[..ID_SUFFIX_LEN]))
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Record ID cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Domain payload stored in a synced collection.
///
/// Implementors describe where the collection lives locally and remotely and
/// how a partial update is applied.
pub trait CollectionItem:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Partial update accepted by `SyncEngine::update` and `PUT /{collection}/{id}`.
    type Patch: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Key of the collection blob in the local store.
    const STORAGE_KEY: &'static str;

    /// Path segment of the collection on the REST API.
    const REMOTE_PATH: &'static str;

    /// Human readable collection name used in logs.
    const LABEL: &'static str;

    /// Apply the non-empty fields of `patch`.
    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Reject payloads that must never be stored.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// A record as held in memory and persisted in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<T> {
    /// Client-generated identifier
    pub id: RecordId,
    /// Day the record belongs to
    pub date: NaiveDate,
    /// Device clock at creation (Unix ms)
    pub timestamp: i64,
    /// Whether the server acknowledged this id
    #[serde(default)]
    pub synced: bool,
    /// Domain payload
    #[serde(flatten)]
    pub fields: T,
}

impl<T> Record<T> {
    /// Create a new unsynced record with a fresh id.
    pub fn new(fields: T, date: NaiveDate) -> Self {
        Self {
            id: RecordId::generate(),
            date,
            timestamp: now_millis(),
            synced: false,
            fields,
        }
    }

    /// Ordering used for every published collection: newest day first, then
    /// newest creation time.
    pub fn display_order(&self, other: &Self) -> Ordering {
        other
            .date
            .cmp(&self.date)
            .then_with(|| other.timestamp.cmp(&self.timestamp))
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Sort records by `(date desc, timestamp desc)`.
pub fn sort_records<T>(records: &mut [Record<T>]) {
    records.sort_by(Record::display_order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(value: &str) -> NaiveDate {
        value.parse().unwrap()
    }

    fn record(id: &str, date: &str, timestamp: i64) -> Record<String> {
        Record {
            id: RecordId::from(id),
            date: day(date),
            timestamp,
            synced: false,
            fields: String::new(),
        }
    }

    #[test]
    fn test_record_id_unique() {
        let id1 = RecordId::generate();
        let id2 = RecordId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_record_id_shape() {
        let id = RecordId::generate();
        let (millis, suffix) = id.as_str().split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
    }

    #[test]
    fn test_record_id_parse() {
        let parsed: RecordId = " abc-123 ".parse().unwrap();
        assert_eq!(parsed.as_str(), "abc-123");
        assert!("   ".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_sort_records_date_then_timestamp() {
        let mut records = vec![
            record("a", "2024-01-02", 5),
            record("b", "2024-01-03", 1),
            record("c", "2024-01-02", 9),
            record("d", "2024-01-03", 7),
        ];
        sort_records(&mut records);

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_missing_synced_flag_defaults_to_false() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Payload {
            food: String,
        }

        let json = r#"{"id":"x-1","date":"2024-01-02","timestamp":10,"food":"apple"}"#;
        let parsed: Record<Payload> = serde_json::from_str(json).unwrap();
        assert!(!parsed.synced);
        assert_eq!(parsed.fields.food, "apple");
    }
}
