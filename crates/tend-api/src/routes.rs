use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::store::{Collection, CreateOutcome, RecordStore, StoredRecord};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    records: Arc<RecordStore>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            records: Arc::new(RecordStore::new(config.max_records_per_collection)),
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/{collection}", get(list_records).post(create_record))
        .route(
            "/{collection}/{id}",
            put(update_record).delete(delete_record),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    records: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        records: state.records.total().await,
    })
}

async fn list_records(
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> Result<Json<Vec<StoredRecord>>, AppError> {
    let collection = collection(&segment)?;
    Ok(Json(state.records.list(collection).await))
}

async fn create_record(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<StoredRecord>), AppError> {
    let collection = collection(&segment)?;
    let Json(body) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    match state.records.create(collection, body).await? {
        CreateOutcome::Created(record) => {
            tracing::info!(
                collection = collection.segment(),
                client_id = record_id(&record),
                "Created record"
            );
            Ok((StatusCode::CREATED, Json(record)))
        }
        CreateOutcome::Replayed(record) => {
            tracing::debug!(
                collection = collection.segment(),
                client_id = record_id(&record),
                "Replayed create"
            );
            Ok((StatusCode::OK, Json(record)))
        }
    }
}

async fn update_record(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StoredRecord>, AppError> {
    let collection = collection(&segment)?;
    let Json(patch) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let record = state.records.update(collection, &id, patch).await?;
    tracing::info!(collection = collection.segment(), client_id = %id, "Updated record");
    Ok(Json(record))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let collection = collection(&segment)?;
    let existed = state.records.delete(collection, &id).await;
    tracing::info!(
        collection = collection.segment(),
        client_id = %id,
        existed,
        "Deleted record"
    );
    Ok(StatusCode::NO_CONTENT)
}

fn collection(segment: &str) -> Result<Collection, AppError> {
    Collection::from_segment(segment)
        .ok_or_else(|| AppError::not_found(format!("unknown collection '{segment}'")))
}

fn record_id(record: &StoredRecord) -> &str {
    record.get("client_id").and_then(Value::as_str).unwrap_or("-")
}
