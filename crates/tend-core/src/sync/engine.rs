//! Optimistic sync engine shared by every collection

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::confirmations::Confirmations;
use super::merge::{merge_remote, MergeContext};
use super::{LoadState, Snapshot, SyncOptions};
use crate::error::{Error, Result};
use crate::models::{sort_records, CollectionItem, Record, RecordId};
use crate::remote::{RemoteError, RemoteGateway, RemoteRecord};
use crate::store::LocalStore;
use crate::util::today;

struct EngineState<T> {
    records: Vec<Record<T>>,
    load_state: LoadState,
    loaded: bool,
    /// Edit generation per id, bumped on every local write.
    generations: HashMap<RecordId, u64>,
    next_generation: u64,
    /// Ids whose remote delete is in flight.
    deleting: HashSet<RecordId>,
    tombstones: Vec<RecordId>,
    confirmations: Confirmations,
    /// Completion signal of the last background call issued per id.
    lanes: HashMap<RecordId, watch::Receiver<bool>>,
    /// Pulls whose `list()` has not returned yet.
    active_pulls: usize,
    /// Ids whose remote delete finished while a pull was outstanding; that
    /// pull's snapshot may still contain them.
    deleted_mid_pull: HashSet<RecordId>,
}

impl<T> EngineState<T> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            load_state: LoadState::Uninitialized,
            loaded: false,
            generations: HashMap::new(),
            next_generation: 0,
            deleting: HashSet::new(),
            tombstones: Vec::new(),
            confirmations: Confirmations::default(),
            lanes: HashMap::new(),
            active_pulls: 0,
            deleted_mid_pull: HashSet::new(),
        }
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| &record.id == id)
    }

    fn bump(&mut self, id: &RecordId) -> u64 {
        self.next_generation += 1;
        self.generations.insert(id.clone(), self.next_generation);
        self.next_generation
    }

    fn generation(&self, id: &RecordId) -> u64 {
        self.generations.get(id).copied().unwrap_or_default()
    }

    /// Move `id` from unsynced to synced if it still exists and has not
    /// been written since `generation`.
    fn acknowledge(&mut self, id: &RecordId, generation: u64) -> bool {
        if self.generation(id) != generation {
            return false;
        }
        match self.records.iter_mut().find(|record| &record.id == id) {
            Some(record) if !record.synced => {
                record.synced = true;
                true
            }
            _ => false,
        }
    }

    /// Queue a background call for `id` behind the previous one.
    fn enter_lane(&mut self, id: &RecordId) -> (watch::Sender<bool>, Option<watch::Receiver<bool>>) {
        self.lanes
            .retain(|_, done| !*done.borrow() && done.has_changed().is_ok());
        let (sender, receiver) = watch::channel(false);
        (sender, self.lanes.insert(id.clone(), receiver))
    }

    fn excluded(&self) -> HashSet<RecordId> {
        self.deleting
            .iter()
            .chain(&self.tombstones)
            .chain(&self.deleted_mid_pull)
            .cloned()
            .collect()
    }
}

struct Shared<T> {
    store: LocalStore<T>,
    options: SyncOptions,
    state: Mutex<EngineState<T>>,
    publisher: watch::Sender<Snapshot<T>>,
}

impl<T: CollectionItem> Shared<T> {
    /// Lock the state, loading the persisted collection on first access.
    fn lock(&self) -> MutexGuard<'_, EngineState<T>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.loaded {
            let mut records = self.store.load();
            sort_records(&mut records);
            state.records = records;
            if self.options.retain_failed_deletes {
                state.tombstones = self.store.load_tombstones();
            }
            state.loaded = true;
            tracing::debug!(
                collection = T::LABEL,
                records = state.records.len(),
                "Loaded local collection"
            );
        }
        state
    }

    fn persist(&self, state: &EngineState<T>) {
        if let Err(error) = self.store.save(&state.records) {
            tracing::warn!(collection = T::LABEL, "Failed to persist local collection: {error}");
        }
    }

    fn persist_tombstones(&self, state: &EngineState<T>) {
        if let Err(error) = self.store.save_tombstones(&state.tombstones) {
            tracing::warn!(collection = T::LABEL, "Failed to persist pending deletes: {error}");
        }
    }

    fn publish(&self, state: &EngineState<T>) {
        self.publisher.send_replace(Snapshot {
            records: Arc::new(state.records.clone()),
            state: state.load_state,
        });
    }

    fn commit(&self, state: &EngineState<T>) {
        self.persist(state);
        self.publish(state);
    }

    fn acknowledge(&self, id: &RecordId, generation: u64) {
        let mut state = self.lock();
        if state.acknowledge(id, generation) {
            self.commit(&state);
            tracing::debug!(collection = T::LABEL, id = %id, "Record synced");
        }
    }

    fn finish_delete(&self, id: &RecordId, result: std::result::Result<(), RemoteError>) {
        let mut state = self.lock();
        if state.deleting.remove(id) && state.active_pulls > 0 {
            state.deleted_mid_pull.insert(id.clone());
        }
        match result {
            Ok(()) => {
                let before = state.tombstones.len();
                state.tombstones.retain(|tombstone| tombstone != id);
                if state.tombstones.len() != before {
                    self.persist_tombstones(&state);
                }
                tracing::debug!(collection = T::LABEL, id = %id, "Remote delete confirmed");
            }
            Err(error) => {
                log_remote_failure::<T>("delete", Some(id), &error);
                if self.options.retain_failed_deletes && !state.tombstones.contains(id) {
                    state.tombstones.push(id.clone());
                    self.persist_tombstones(&state);
                }
            }
        }
    }
}

/// Local-first engine for one collection.
///
/// Mutations return as soon as memory and the local store reflect them; the
/// matching remote call runs in a detached task. All failures from that path
/// are logged and absorbed.
pub struct SyncEngine<T, G> {
    shared: Arc<Shared<T>>,
    gateway: Arc<G>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: CollectionItem, G: RemoteGateway<T>> SyncEngine<T, G> {
    pub fn new(store: LocalStore<T>, gateway: Arc<G>) -> Self {
        Self::with_options(store, gateway, SyncOptions::default())
    }

    pub fn with_options(store: LocalStore<T>, gateway: Arc<G>, options: SyncOptions) -> Self {
        let (publisher, _) = watch::channel(Snapshot::default());
        Self {
            shared: Arc::new(Shared {
                store,
                options,
                state: Mutex::new(EngineState::new()),
                publisher,
            }),
            gateway,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Load local state, push pending records, then reconcile with the server.
    ///
    /// Always ends `Ready`, whatever the server did.
    pub async fn initialize(&self) {
        {
            let mut state = self.shared.lock();
            state.load_state = LoadState::Loading;
            self.shared.publish(&state);
        }

        self.push_pending().await;
        self.retry_deletes().await;
        self.pull().await;

        let mut state = self.shared.lock();
        state.load_state = LoadState::Ready;
        self.shared.publish(&state);
        tracing::info!(
            collection = T::LABEL,
            records = state.records.len(),
            "Collection ready"
        );
    }

    /// Re-run [`SyncEngine::initialize`].
    pub async fn refresh(&self) {
        self.initialize().await;
    }

    /// Add a record dated `date` (today when `None`).
    pub fn add(&self, fields: T, date: Option<NaiveDate>) -> Result<Record<T>> {
        self.insert(fields, date, None)
    }

    /// Add a record produced by `source`, at most once per engine lifetime.
    ///
    /// Returns the existing record when `source` was already confirmed and
    /// that record still exists.
    pub fn add_confirmed(
        &self,
        source: &str,
        fields: T,
        date: Option<NaiveDate>,
    ) -> Result<Record<T>> {
        self.insert(fields, date, Some(source))
    }

    /// Id of the record `source` produced, if it still exists.
    pub fn confirmation(&self, source: &str) -> Option<RecordId> {
        let state = self.shared.lock();
        state
            .confirmations
            .lookup(source, &state.records)
            .map(|record| record.id.clone())
    }

    pub fn update(&self, id: &RecordId, patch: T::Patch) -> Result<Record<T>> {
        let (record, generation, was_synced) = {
            let mut state = self.shared.lock();
            let index = state
                .position(id)
                .ok_or_else(|| Error::NotFound(format!("{} record {id}", T::LABEL)))?;

            let mut fields = state.records[index].fields.clone();
            fields.apply_patch(&patch);
            fields.validate()?;

            let generation = state.bump(id);
            let record = &mut state.records[index];
            let was_synced = record.synced;
            record.fields = fields;
            record.synced = false;
            let record = record.clone();
            self.shared.commit(&state);
            (record, generation, was_synced)
        };
        tracing::debug!(collection = T::LABEL, id = %id, "Updated record");

        if was_synced {
            let shared = Arc::clone(&self.shared);
            let gateway = Arc::clone(&self.gateway);
            let lane_id = id.clone();
            let id = id.clone();
            self.spawn_ordered(&lane_id, async move {
                match gateway.update(&id, &patch).await {
                    Ok(()) => shared.acknowledge(&id, generation),
                    Err(error) => log_remote_failure::<T>("update", Some(&id), &error),
                }
            });
        } else {
            // The server may never have seen this id; push the whole record.
            self.spawn_create(RemoteRecord::from_record(&record), generation);
        }
        Ok(record)
    }

    pub fn delete(&self, id: &RecordId) -> Result<()> {
        {
            let mut state = self.shared.lock();
            let index = state
                .position(id)
                .ok_or_else(|| Error::NotFound(format!("{} record {id}", T::LABEL)))?;
            state.records.remove(index);
            state.generations.remove(id);
            state.deleting.insert(id.clone());
            state.confirmations.forget(id);
            self.shared.commit(&state);
        }
        tracing::debug!(collection = T::LABEL, id = %id, "Deleted record");

        let shared = Arc::clone(&self.shared);
        let gateway = Arc::clone(&self.gateway);
        let lane_id = id.clone();
        let id = id.clone();
        self.spawn_ordered(&lane_id, async move {
            let result = gateway.delete(&id).await;
            shared.finish_delete(&id, result);
        });
        Ok(())
    }

    /// Current collection in display order.
    pub fn records(&self) -> Vec<Record<T>> {
        self.shared.lock().records.clone()
    }

    pub fn get(&self, id: &RecordId) -> Option<Record<T>> {
        let state = self.shared.lock();
        state.position(id).map(|index| state.records[index].clone())
    }

    /// Number of records the server has not acknowledged.
    pub fn pending_count(&self) -> usize {
        self.shared
            .lock()
            .records
            .iter()
            .filter(|record| !record.synced)
            .count()
    }

    /// Ids whose remote delete is still owed to the server.
    pub fn pending_deletes(&self) -> Vec<RecordId> {
        self.shared.lock().tombstones.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state() != LoadState::Ready
    }

    pub fn state(&self) -> LoadState {
        self.shared.lock().load_state
    }

    /// Receive a [`Snapshot`] after every change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.shared.publisher.subscribe()
    }

    /// Wait for every background call spawned so far.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.tasks());
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(error) = task.await {
                    tracing::warn!(collection = T::LABEL, "Background sync task failed: {error}");
                }
            }
        }
    }

    fn insert(&self, fields: T, date: Option<NaiveDate>, source: Option<&str>) -> Result<Record<T>> {
        fields.validate()?;

        let (record, generation) = {
            let mut state = self.shared.lock();
            if let Some(source) = source {
                if let Some(existing) = state.confirmations.lookup(source, &state.records) {
                    tracing::debug!(collection = T::LABEL, source, "Source already confirmed");
                    return Ok(existing.clone());
                }
            }

            let mut record = Record::new(fields, date.unwrap_or_else(today));
            while state.position(&record.id).is_some() {
                record.id = RecordId::generate();
            }
            let generation = state.bump(&record.id);
            state.records.insert(0, record.clone());
            sort_records(&mut state.records);
            if let Some(source) = source {
                state.confirmations.remember(source, record.id.clone());
            }
            self.shared.commit(&state);
            (record, generation)
        };
        tracing::debug!(collection = T::LABEL, id = %record.id, "Added record");

        self.spawn_create(RemoteRecord::from_record(&record), generation);
        Ok(record)
    }

    fn spawn_create(&self, payload: RemoteRecord<T>, generation: u64) {
        let shared = Arc::clone(&self.shared);
        let gateway = Arc::clone(&self.gateway);
        let lane_id = payload.client_id.clone();
        self.spawn_ordered(&lane_id, async move {
            match gateway.create(&payload).await {
                Ok(_) => shared.acknowledge(&payload.client_id, generation),
                Err(error) => log_remote_failure::<T>("create", Some(&payload.client_id), &error),
            }
        });
    }

    /// Spawn `operation` once every earlier call for `id` has finished, so
    /// the server sees writes to one record in the order they were made.
    fn spawn_ordered<F>(&self, id: &RecordId, operation: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done, previous) = self.shared.lock().enter_lane(id);
        self.spawn(async move {
            if let Some(mut previous) = previous {
                // A closed channel means the earlier call is gone as well.
                let _ = previous.wait_for(|finished| *finished).await;
            }
            operation.await;
            done.send_replace(true);
        });
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(
                collection = T::LABEL,
                "No async runtime; change stays pending until the next initialize"
            );
            return;
        };
        let join = handle.spawn(task);
        let mut tasks = self.tasks();
        tasks.retain(|task| !task.is_finished());
        tasks.push(join);
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn push_pending(&self) {
        let pending: Vec<RecordId> = {
            let state = self.shared.lock();
            state
                .records
                .iter()
                .filter(|record| !record.synced)
                .map(|record| record.id.clone())
                .collect()
        };
        if pending.is_empty() {
            return;
        }

        let mut pushed = 0_usize;
        for id in pending {
            // Wait for earlier calls on this id; a delete queued meanwhile
            // must never be overtaken by this create.
            let (done, previous) = self.shared.lock().enter_lane(&id);
            if let Some(mut previous) = previous {
                let _ = previous.wait_for(|finished| *finished).await;
            }

            let payload = {
                let state = self.shared.lock();
                state
                    .position(&id)
                    .map(|index| &state.records[index])
                    .filter(|record| !record.synced)
                    .map(|record| (RemoteRecord::from_record(record), state.generation(&id)))
            };
            let Some((payload, generation)) = payload else {
                done.send_replace(true);
                continue;
            };

            let offline = match self.gateway.create(&payload).await {
                Ok(_) => {
                    let mut state = self.shared.lock();
                    if state.acknowledge(&id, generation) {
                        self.shared.commit(&state);
                        pushed += 1;
                    }
                    false
                }
                Err(error) => {
                    log_remote_failure::<T>("create", Some(&id), &error);
                    error.is_offline()
                }
            };
            done.send_replace(true);
            if offline {
                break;
            }
        }
        tracing::debug!(collection = T::LABEL, pushed, "Pushed pending records");
    }

    async fn retry_deletes(&self) {
        let tombstones = self.shared.lock().tombstones.clone();
        if tombstones.is_empty() {
            return;
        }

        let mut cleared = Vec::new();
        for id in tombstones {
            match self.gateway.delete(&id).await {
                Ok(()) => cleared.push(id),
                Err(error) => {
                    log_remote_failure::<T>("delete", Some(&id), &error);
                    if error.is_offline() {
                        break;
                    }
                }
            }
        }
        if cleared.is_empty() {
            return;
        }

        let mut state = self.shared.lock();
        state.tombstones.retain(|id| !cleared.contains(id));
        self.shared.persist_tombstones(&state);
        tracing::debug!(collection = T::LABEL, cleared = cleared.len(), "Retried pending deletes");
    }

    async fn pull(&self) {
        let settled: HashSet<RecordId> = {
            let mut state = self.shared.lock();
            state.active_pulls += 1;
            state
                .records
                .iter()
                .filter(|record| record.synced)
                .map(|record| record.id.clone())
                .collect()
        };

        let listed = self.gateway.list().await;

        let mut state = self.shared.lock();
        let excluded = state.excluded();
        state.active_pulls = state.active_pulls.saturating_sub(1);
        if state.active_pulls == 0 {
            state.deleted_mid_pull.clear();
        }

        let remote = match listed {
            Ok(remote) => remote,
            Err(error) => {
                drop(state);
                log_remote_failure::<T>("list", None, &error);
                return;
            }
        };
        let server_count = remote.len();

        let local = std::mem::take(&mut state.records);
        state.records = merge_remote(
            local,
            remote,
            &MergeContext {
                excluded: Some(&excluded),
                settled: Some(&settled),
            },
        );
        self.shared.commit(&state);
        tracing::debug!(
            collection = T::LABEL,
            server = server_count,
            merged = state.records.len(),
            "Merged server snapshot"
        );
    }
}

fn log_remote_failure<T: CollectionItem>(
    operation: &str,
    id: Option<&RecordId>,
    error: &RemoteError,
) {
    let id = id.map_or("-", RecordId::as_str);
    if error.is_offline() {
        tracing::debug!(collection = T::LABEL, operation, id, "Remote {operation} skipped: {error}");
    } else {
        tracing::warn!(collection = T::LABEL, operation, id, "Remote {operation} failed: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CalorieEntry;

    fn state_with(record: Record<CalorieEntry>) -> EngineState<CalorieEntry> {
        let mut state = EngineState::new();
        state.loaded = true;
        state.records.push(record);
        state
    }

    #[test]
    fn stale_acknowledgement_does_not_mark_newer_edit() {
        let record = Record::new(CalorieEntry::new("Tea", 2), today());
        let id = record.id.clone();
        let mut state = state_with(record);

        let issued = state.bump(&id);
        let newer = state.bump(&id);

        assert!(!state.acknowledge(&id, issued));
        assert!(!state.records[0].synced);
        assert!(state.acknowledge(&id, newer));
        assert!(state.records[0].synced);
    }

    #[test]
    fn acknowledgement_of_removed_record_is_ignored() {
        let record = Record::new(CalorieEntry::new("Tea", 2), today());
        let id = record.id.clone();
        let mut state = state_with(record);
        let issued = state.bump(&id);

        state.records.clear();
        assert!(!state.acknowledge(&id, issued));
    }

    #[test]
    fn lanes_chain_calls_per_id() {
        let mut state = EngineState::<CalorieEntry>::new();
        let id = RecordId::from("a");

        let (first_done, first_previous) = state.enter_lane(&id);
        assert!(first_previous.is_none());

        let (_second_done, second_previous) = state.enter_lane(&id);
        let second_previous = second_previous.unwrap();
        assert!(!*second_previous.borrow());

        first_done.send_replace(true);
        assert!(*second_previous.borrow());
        assert!(state.enter_lane(&RecordId::from("b")).1.is_none());
    }
}
