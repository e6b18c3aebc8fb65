use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tend_api::{app_router, AppConfig, AppState};
use tend_core::{
    CalorieEntry, CaloriePatch, HttpGateway, KeyValueStore, LocalStore, MemoryStore,
    PasswordAccount, Record, RecordId, RemoteGateway, RemoteRecord, SyncEngine, WorkoutActivity,
};

async fn spawn_server() -> String {
    let state = AppState::from_config(Arc::new(AppConfig::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app_router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn gateway<T: tend_core::CollectionItem>(base: &str) -> Arc<HttpGateway<T>> {
    Arc::new(HttpGateway::new(base, Duration::from_secs(5)).unwrap())
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

#[tokio::test]
async fn post_status_codes_and_validation() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let body = json!({ "client_id": "c-1", "food": "Toast", "calories": 120 });

    let first = client
        .post(format!("{base}/calories"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::CREATED);

    let replay = client
        .post(format!("{base}/calories"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), reqwest::StatusCode::OK);

    let missing_id = client
        .post(format!("{base}/calories"))
        .json(&json!({ "food": "Toast" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_id.status(), reqwest::StatusCode::BAD_REQUEST);
    let error: Value = missing_id.json().await.unwrap();
    assert!(error["error"].as_str().unwrap().contains("client_id"));

    let unknown = client.get(format!("{base}/notes")).send().await.unwrap();
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);

    let health: Value = client
        .get(format!("{base}/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["records"], 1);
}

#[tokio::test]
async fn http_gateway_follows_the_contract() {
    let base = spawn_server().await;
    let gateway = gateway::<CalorieEntry>(&base);
    let record = Record::new(CalorieEntry::new("Toast", 120), day(1));
    let payload = RemoteRecord::from_record(&record);

    let stored = gateway.create(&payload).await.unwrap();
    assert_eq!(stored, payload);
    gateway.create(&payload).await.unwrap();
    assert_eq!(gateway.list().await.unwrap(), vec![payload.clone()]);

    let patch = CaloriePatch {
        food: None,
        calories: Some(150),
    };
    gateway.update(&record.id, &patch).await.unwrap();
    assert_eq!(gateway.list().await.unwrap()[0].fields.calories, 150);

    let unknown = gateway.update(&RecordId::from("nope"), &patch).await;
    assert!(unknown.is_err());

    gateway.delete(&record.id).await.unwrap();
    gateway.delete(&record.id).await.unwrap();
    assert!(gateway.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn engine_round_trips_through_the_server() {
    let base = spawn_server().await;

    let phone = SyncEngine::new(
        LocalStore::<WorkoutActivity>::new(Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>),
        gateway::<WorkoutActivity>(&base),
    );
    phone.initialize().await;
    let run = phone
        .add(WorkoutActivity::new("Run", 30, 280), Some(day(2)))
        .unwrap();
    phone.settle().await;
    assert!(phone.get(&run.id).unwrap().synced);

    let laptop = SyncEngine::new(
        LocalStore::<WorkoutActivity>::new(Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>),
        gateway::<WorkoutActivity>(&base),
    );
    laptop.initialize().await;

    let seen = laptop.records();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, run.id);
    assert_eq!(seen[0].date, day(2));
    assert_eq!(seen[0].fields, WorkoutActivity::new("Run", 30, 280));
    assert!(seen[0].synced);
}

#[tokio::test]
async fn offline_writes_reach_the_server_after_reconnect() {
    let base = spawn_server().await;
    let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    // Nothing listens on a port we bound and released.
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let offline = SyncEngine::new(
        LocalStore::<PasswordAccount>::new(Arc::clone(&backend)),
        gateway::<PasswordAccount>(&closed),
    );
    offline.initialize().await;
    offline
        .add(PasswordAccount::new("mail", "me@example.com", "hunter2"), None)
        .unwrap();
    offline.settle().await;
    assert_eq!(offline.pending_count(), 1);

    let online = SyncEngine::new(
        LocalStore::<PasswordAccount>::new(Arc::clone(&backend)),
        gateway::<PasswordAccount>(&base),
    );
    online.initialize().await;
    online.initialize().await;

    assert_eq!(online.pending_count(), 0);
    let server = gateway::<PasswordAccount>(&base).list().await.unwrap();
    assert_eq!(server.len(), 1);
    assert_eq!(server[0].fields.service, "mail");
}

#[tokio::test]
async fn create_acknowledged_without_a_readable_body_counts_as_synced() {
    let router = axum::Router::new().route(
        "/calories",
        axum::routing::post(|| async { (axum::http::StatusCode::CREATED, "created") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let gateway = gateway::<CalorieEntry>(&base);
    let record = Record::new(CalorieEntry::new("Toast", 120), day(4));
    let payload = RemoteRecord::from_record(&record);
    assert_eq!(gateway.create(&payload).await.unwrap(), payload);

    let engine = SyncEngine::new(
        LocalStore::<CalorieEntry>::new(Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>),
        gateway,
    );
    let added = engine
        .add(CalorieEntry::new("Soup", 90), Some(day(4)))
        .unwrap();
    engine.settle().await;

    assert!(engine.get(&added.id).unwrap().synced);
    assert_eq!(engine.pending_count(), 0);
}
