//! tend-core - Core library for Tend
//!
//! This crate contains the record models, the local store, the remote gateway
//! and the local-first sync engine shared by every Tend interface (CLI, API
//! test double, and the mobile shell).

pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;
pub mod util;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use models::{
    AccountPatch, CalorieEntry, CaloriePatch, CollectionItem, PasswordAccount, Record, RecordId,
    WorkoutActivity, WorkoutPatch,
};
pub use remote::{HttpGateway, MemoryGateway, RemoteError, RemoteGateway, RemoteRecord};
pub use store::{KeyValueStore, LocalStore, MemoryStore, SqliteStore};
pub use sync::{LoadState, Snapshot, SyncEngine, SyncOptions};
