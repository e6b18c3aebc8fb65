use std::sync::Arc;

use chrono::NaiveDate;
use tend_core::{
    ClientConfig, CollectionItem, HttpGateway, KeyValueStore, LocalStore, Record, RecordId,
    SqliteStore, SyncEngine,
};

use crate::error::CliError;

/// Characters of an id shown in listings: the millisecond stamp plus a few
/// random characters.
const SHORT_ID_LEN: usize = 18;
const MAX_AMBIGUOUS_MATCHES: usize = 3;

pub type Engine<T> = SyncEngine<T, HttpGateway<T>>;

/// Everything a command needs: resolved config and the opened local store.
pub struct Context {
    config: ClientConfig,
    backend: Arc<dyn KeyValueStore>,
}

impl Context {
    pub fn open(config: ClientConfig) -> Result<Self, CliError> {
        let backend = SqliteStore::open(config.database_path())?;
        Ok(Self::from_parts(config, Arc::new(backend)))
    }

    pub fn from_parts(config: ClientConfig, backend: Arc<dyn KeyValueStore>) -> Self {
        Self { config, backend }
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the engine for `T` and run its initial sync pass.
    pub async fn engine<T: CollectionItem>(&self) -> Result<Engine<T>, CliError> {
        let engine = SyncEngine::with_options(
            LocalStore::new(Arc::clone(&self.backend)),
            Arc::new(self.config.gateway::<T>()?),
            self.config.sync_options(),
        );
        engine.initialize().await;
        Ok(engine)
    }
}

pub fn normalize_record_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyRecordId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Resolve a full id or a unique id prefix against `records`.
pub fn resolve_record_id<T>(records: &[Record<T>], query: &str) -> Result<RecordId, CliError> {
    let query = normalize_record_identifier(query)?;

    if let Some(record) = records.iter().find(|record| record.id.as_str() == query) {
        return Ok(record.id.clone());
    }

    let matching = records
        .iter()
        .filter(|record| record.id.as_str().starts_with(&query))
        .map(|record| &record.id)
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::RecordNotFound(query)),
        [id] => Ok((*id).clone()),
        _ => {
            let options = matching
                .iter()
                .take(MAX_AMBIGUOUS_MATCHES)
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousRecordId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>, CliError> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| CliError::InvalidDate(value.to_string()))
}

pub fn short_id(id: &RecordId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

/// Trailing marker for records the server has not acknowledged yet.
pub const fn pending_marker(synced: bool) -> &'static str {
    if synced {
        ""
    } else {
        "  (pending)"
    }
}

pub fn on_date<T: Clone>(records: &[Record<T>], date: Option<NaiveDate>) -> Vec<Record<T>> {
    records
        .iter()
        .filter(|record| date.map_or(true, |date| record.date == date))
        .cloned()
        .collect()
}

/// Wait for background pushes so they are not cut off when the process exits.
pub async fn finish<T: CollectionItem>(engine: &Engine<T>) {
    engine.settle().await;
    let pending = engine.pending_count();
    if pending > 0 {
        tracing::info!(
            collection = T::LABEL,
            pending,
            "Changes saved locally; they will be pushed on the next sync"
        );
    }
}
