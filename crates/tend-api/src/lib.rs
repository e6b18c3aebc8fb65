//! tend-api - Reference REST backend for Tend
//!
//! Serves each synced collection under `/{collection}` with idempotent
//! creates keyed by `client_id`. Records live in memory only.

pub mod config;
pub mod error;
pub mod routes;
pub mod store;

pub use config::AppConfig;
pub use routes::{app_router, AppState};
