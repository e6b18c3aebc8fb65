//! In-process [`RemoteGateway`] for tests and offline demos

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::{RemoteError, RemoteGateway, RemoteRecord};
use crate::models::{CollectionItem, RecordId};

/// Which remote operation a failure toggle applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    List,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct Counters {
    create: AtomicUsize,
    list: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

#[derive(Debug, Default)]
struct Failures {
    create: AtomicBool,
    list: AtomicBool,
    update: AtomicBool,
    delete: AtomicBool,
}

/// Server double holding one collection in memory.
///
/// Creates are upserts keyed by `client_id`, deletes of unknown ids succeed,
/// and every call is counted. Calls can be failed per operation, failed
/// wholesale with [`MemoryGateway::set_offline`], or parked until
/// [`MemoryGateway::release`] with [`MemoryGateway::hold`].
#[derive(Debug)]
pub struct MemoryGateway<T> {
    records: Mutex<Vec<RemoteRecord<T>>>,
    offline: AtomicBool,
    failures: Failures,
    calls: Counters,
    held: watch::Sender<bool>,
}

impl<T: CollectionItem> Default for MemoryGateway<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CollectionItem> MemoryGateway<T> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Start with records already present on the "server".
    pub fn with_records(records: Vec<RemoteRecord<T>>) -> Self {
        let (held, _) = watch::channel(false);
        Self {
            records: Mutex::new(records),
            offline: AtomicBool::new(false),
            failures: Failures::default(),
            calls: Counters::default(),
            held,
        }
    }

    /// Fail every call with [`RemoteError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail one kind of call with an API error.
    pub fn set_failing(&self, operation: Operation, failing: bool) {
        let flag = match operation {
            Operation::Create => &self.failures.create,
            Operation::List => &self.failures.list,
            Operation::Update => &self.failures.update,
            Operation::Delete => &self.failures.delete,
        };
        flag.store(failing, Ordering::SeqCst);
    }

    /// Park every call until [`MemoryGateway::release`].
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    pub fn release(&self) {
        self.held.send_replace(false);
    }

    /// Number of calls made for `operation`, successful or not.
    pub fn calls(&self, operation: Operation) -> usize {
        let counter = match operation {
            Operation::Create => &self.calls.create,
            Operation::List => &self.calls.list,
            Operation::Update => &self.calls.update,
            Operation::Delete => &self.calls.delete,
        };
        counter.load(Ordering::SeqCst)
    }

    /// Current server-side records.
    pub fn records(&self) -> Vec<RemoteRecord<T>> {
        self.lock().clone()
    }

    /// Insert or replace a record directly, as another device would.
    pub fn insert(&self, record: RemoteRecord<T>) {
        let mut records = self.lock();
        match records.iter_mut().find(|stored| stored.client_id == record.client_id) {
            Some(stored) => *stored = record,
            None => records.push(record),
        }
    }

    /// Remove a record directly, as another device would.
    pub fn remove(&self, id: &RecordId) {
        self.lock().retain(|stored| &stored.client_id != id);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RemoteRecord<T>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, operation: Operation) -> Result<(), RemoteError> {
        let (counter, failing) = match operation {
            Operation::Create => (&self.calls.create, &self.failures.create),
            Operation::List => (&self.calls.list, &self.failures.list),
            Operation::Update => (&self.calls.update, &self.failures.update),
            Operation::Delete => (&self.calls.delete, &self.failures.delete),
        };
        counter.fetch_add(1, Ordering::SeqCst);

        let mut held = self.held.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = held.wait_for(|held| !*held).await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Offline);
        }
        if failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Api(format!("simulated {operation:?} failure (500)")));
        }
        Ok(())
    }
}

impl<T: CollectionItem> RemoteGateway<T> for MemoryGateway<T> {
    async fn create(&self, record: &RemoteRecord<T>) -> Result<RemoteRecord<T>, RemoteError> {
        self.enter(Operation::Create).await?;
        self.insert(record.clone());
        Ok(record.clone())
    }

    async fn list(&self) -> Result<Vec<RemoteRecord<T>>, RemoteError> {
        self.enter(Operation::List).await?;
        Ok(self.records())
    }

    async fn update(&self, id: &RecordId, patch: &T::Patch) -> Result<(), RemoteError> {
        self.enter(Operation::Update).await?;
        let mut records = self.lock();
        let stored = records
            .iter_mut()
            .find(|stored| &stored.client_id == id)
            .ok_or_else(|| RemoteError::Api(format!("record {id} not found (404)")))?;
        stored.fields.apply_patch(patch);
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.enter(Operation::Delete).await?;
        self.remove(id);
        Ok(())
    }
}
