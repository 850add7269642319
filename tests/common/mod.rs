// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response};
use chrono::{DateTime, TimeZone, Utc};
use signal_vault::config::Config;
use signal_vault::db::{FirestoreDb, MemoryStore};
use signal_vault::middleware::auth::create_jwt;
use signal_vault::routes::create_router;
use signal_vault::services::{BlobStorage, SharedStore};
use signal_vault::AppState;
use std::sync::Arc;
use tower::ServiceExt;

#[allow(dead_code)]
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Fixed reference instant for time-sensitive scenarios.
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

/// Build state over `store` with in-memory receipt storage.
#[allow(dead_code)]
pub fn state_with_store(store: SharedStore) -> Arc<AppState> {
    Arc::new(AppState::new(
        Config::test_default(),
        store,
        BlobStorage::new_mock(),
    ))
}

/// App backed by the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = state_with_store(Arc::new(MemoryStore::new()));
    (create_router(state.clone()), state)
}

/// App whose store is unreachable (every call fails).
#[allow(dead_code)]
pub fn create_offline_app() -> (axum::Router, Arc<AppState>) {
    let state = state_with_store(Arc::new(FirestoreDb::new_mock()));
    (create_router(state.clone()), state)
}

/// Session token for a regular user.
#[allow(dead_code)]
pub fn user_token(state: &AppState, user_id: &str) -> String {
    let email = format!("{}@example.com", user_id);
    create_jwt(user_id, Some(&email), &state.config.jwt_signing_key).unwrap()
}

/// Session token for the configured admin.
#[allow(dead_code)]
pub fn admin_token(state: &AppState) -> String {
    create_jwt("admin-uid", Some(ADMIN_EMAIL), &state.config.jwt_signing_key).unwrap()
}

/// Send a request with an optional bearer token and JSON body.
#[allow(dead_code)]
pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.clone().oneshot(request).await.unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
