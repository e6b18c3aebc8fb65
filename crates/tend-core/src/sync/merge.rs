//! Reconciliation of a server snapshot with the local collection

use std::collections::{HashMap, HashSet};

use crate::models::{sort_records, CollectionItem, Record, RecordId};
use crate::remote::RemoteRecord;

/// Ids the merge must treat specially.
#[derive(Debug, Default)]
pub struct MergeContext<'a> {
    /// Deleted locally; never reintroduced from the server.
    pub excluded: Option<&'a HashSet<RecordId>>,
    /// Ids that were already acknowledged when the snapshot was requested.
    ///
    /// A synced local record outside this set was acknowledged while the
    /// snapshot was in flight and is kept even though the server omitted it.
    /// `None` treats every synced record as settled.
    pub settled: Option<&'a HashSet<RecordId>>,
}

/// Union of the server snapshot and the local records it has not seen yet.
///
/// Server records win on id collisions and come back `synced`. Missing
/// server dates and timestamps fall back to the local copy. The result is in
/// display order.
pub fn merge_remote<T: CollectionItem>(
    local: Vec<Record<T>>,
    remote: Vec<RemoteRecord<T>>,
    context: &MergeContext<'_>,
) -> Vec<Record<T>> {
    let excluded = |id: &RecordId| context.excluded.is_some_and(|ids| ids.contains(id));
    let settled = |id: &RecordId| context.settled.map_or(true, |ids| ids.contains(id));

    let local_by_id: HashMap<&RecordId, &Record<T>> =
        local.iter().map(|record| (&record.id, record)).collect();

    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(remote.len() + local.len());
    for server in remote {
        if excluded(&server.client_id) || !seen.insert(server.client_id.clone()) {
            continue;
        }
        let fallback = local_by_id.get(&server.client_id).copied();
        merged.push(server.into_record(fallback));
    }

    merged.extend(
        local
            .iter()
            .filter(|record| {
                !seen.contains(&record.id)
                    && !excluded(&record.id)
                    && (!record.synced || !settled(&record.id))
            })
            .cloned(),
    );

    sort_records(&mut merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CalorieEntry;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn record(id: &str, date: NaiveDate, timestamp: i64, synced: bool) -> Record<CalorieEntry> {
        Record {
            id: RecordId::from(id),
            date,
            timestamp,
            synced,
            fields: CalorieEntry::new(id, 100),
        }
    }

    fn server(id: &str, calories: u32) -> RemoteRecord<CalorieEntry> {
        RemoteRecord {
            client_id: RecordId::from(id),
            fields: CalorieEntry::new(id, calories),
            date: Some(day(2)),
            timestamp: Some(10),
        }
    }

    fn ids(records: &[Record<CalorieEntry>]) -> Vec<&str> {
        records.iter().map(|record| record.id.as_str()).collect()
    }

    #[test]
    fn server_wins_and_unsynced_survive() {
        let settled: HashSet<RecordId> = [RecordId::from("a"), RecordId::from("gone")].into();
        let local = vec![
            record("a", day(1), 1, false),
            record("pending", day(3), 5, false),
            record("gone", day(1), 2, true),
        ];
        let context = MergeContext {
            excluded: None,
            settled: Some(&settled),
        };

        let merged = merge_remote(local, vec![server("a", 999)], &context);

        assert_eq!(ids(&merged), vec!["pending", "a"]);
        assert_eq!(merged[1].fields.calories, 999);
        assert!(merged[1].synced);
        assert!(!merged[0].synced);
    }

    #[test]
    fn missing_server_metadata_falls_back_to_local() {
        let local = vec![record("a", day(5), 42, false)];
        let mut incoming = server("a", 100);
        incoming.date = None;
        incoming.timestamp = None;

        let merged = merge_remote(local, vec![incoming], &MergeContext::default());
        assert_eq!(merged[0].date, day(5));
        assert_eq!(merged[0].timestamp, 42);
    }

    #[test]
    fn excluded_ids_are_not_resurrected() {
        let excluded: HashSet<RecordId> = [RecordId::from("a")].into();
        let context = MergeContext {
            excluded: Some(&excluded),
            settled: None,
        };
        let merged = merge_remote(Vec::new(), vec![server("a", 1), server("b", 2)], &context);
        assert_eq!(ids(&merged), vec!["b"]);
    }

    #[test]
    fn duplicate_server_ids_collapse() {
        let merged = merge_remote(
            Vec::new(),
            vec![server("a", 1), server("a", 2)],
            &MergeContext::default(),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].fields.calories, 1);
    }

    #[test]
    fn synced_record_acknowledged_mid_fetch_is_kept() {
        let settled = HashSet::new();
        let context = MergeContext {
            excluded: None,
            settled: Some(&settled),
        };
        let merged = merge_remote(vec![record("fresh", day(1), 1, true)], Vec::new(), &context);
        assert_eq!(ids(&merged), vec!["fresh"]);
    }
}
