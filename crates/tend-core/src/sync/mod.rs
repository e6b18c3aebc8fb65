//! Local-first synchronization
//!
//! Every mutation is applied to memory and the local store first, published
//! to subscribers, and only then pushed to the server in a detached task.
//! `initialize` pushes whatever is still pending and reconciles with the
//! server snapshot.

mod confirmations;
mod engine;
mod merge;


use std::sync::Arc;

use crate::models::Record;

pub use engine::SyncEngine;
pub use merge::{merge_remote, MergeContext};

/// Lifecycle of an engine. There is no failure state: `Ready` is reached
/// even when the server is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Uninitialized,
    Loading,
    Ready,
}

/// What subscribers observe after every publish.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub records: Arc<Vec<Record<T>>>,
    pub state: LoadState,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            records: Arc::new(Vec::new()),
            state: LoadState::Uninitialized,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Keep ids whose remote delete failed and retry them on `initialize`,
    /// hiding them from the server snapshot until the delete lands.
    pub retain_failed_deletes: bool,
}
