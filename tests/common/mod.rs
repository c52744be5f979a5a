#![allow(dead_code)]

use std::net::TcpListener;
use std::time::Duration;

use market_entry_client::auth::User;
use market_entry_client::config::ClientOptions;
use market_entry_client::data::{AnalysisSnapshot, DataCache};
use market_entry_client::storage::StorageArea;
use market_entry_client::MarketEntry;
use serde_json::{json, Value};
use wiremock::MockServer;

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// API base URL served by `mock_server`
pub fn api_url(mock_server: &MockServer) -> String {
    format!("{}/api/v1", mock_server.uri())
}

/// A base URL nothing listens on, for offline scenarios
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/api/v1", port)
}

pub fn client(url: &str) -> MarketEntry {
    init_logging();
    MarketEntry::new_with_options(
        url,
        ClientOptions::default().with_request_timeout(Some(Duration::from_secs(5))),
    )
}

pub fn client_on(url: &str, storage: StorageArea) -> MarketEntry {
    init_logging();
    MarketEntry::with_storage(
        url,
        ClientOptions::default().with_request_timeout(Some(Duration::from_secs(5))),
        storage,
    )
}

pub fn user_json(id: i64) -> Value {
    json!({
        "id": id,
        "email": format!("user{}@example.com", id),
        "first_name": "Test",
        "last_name": format!("User{}", id),
        "is_verified": true,
        "created_at": "2024-05-01T10:00:00Z"
    })
}

pub fn user(id: i64) -> User {
    serde_json::from_value(user_json(id)).unwrap()
}

/// Log `id` in without the login endpoint: token in storage plus identity
pub fn sign_in_directly(client: &MarketEntry, id: i64, token: &str) {
    client.storage().set("authToken", token).unwrap();
    client.auth().set_user(user(id));
}

pub fn summary_json(id: i64, created_at: &str) -> Value {
    json!({
        "id": id,
        "company_name": "Acme Corp",
        "target_market": "Germany",
        "industry": "Retail",
        "status": "completed",
        "created_at": created_at
    })
}

/// Wait until the snapshot satisfies `predicate`
pub async fn wait_for_snapshot(
    cache: &DataCache,
    predicate: impl FnMut(&AnalysisSnapshot) -> bool,
) -> AnalysisSnapshot {
    let mut rx = cache.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("snapshot channel closed")
        .clone();
    snapshot
}
