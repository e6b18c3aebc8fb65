//! Dedupe cache for records created from a confirmable source

use std::collections::HashMap;

use crate::models::{Record, RecordId};

/// Maps a caller-chosen source reference (e.g. a chat message id) to the
/// record it produced, so confirming the same source twice adds one record.
#[derive(Debug, Default)]
pub struct Confirmations {
    by_source: HashMap<String, RecordId>,
}

impl Confirmations {
    /// Record id produced by `source`, if that record still exists.
    pub fn lookup<'a, T>(&self, source: &str, records: &'a [Record<T>]) -> Option<&'a Record<T>> {
        let id = self.by_source.get(source)?;
        records.iter().find(|record| &record.id == id)
    }

    pub fn remember(&mut self, source: &str, id: RecordId) {
        self.by_source.insert(source.to_string(), id);
    }

    /// Drop every source pointing at `id`.
    pub fn forget(&mut self, id: &RecordId) {
        self.by_source.retain(|_, existing| existing != id);
    }
}
