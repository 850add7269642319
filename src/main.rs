// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signal Vault API Server
//!
//! Grants and checks time-bounded access to premium services, redeems
//! single-use access codes and records broker verifications and payments
//! for admin review.

use signal_vault::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryStore},
    services::{BlobStorage, SharedStore},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.store_backend,
        admins = config.admin_emails.len(),
        "Starting Signal Vault API"
    );

    let store: SharedStore = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let storage = match config.receipts_bucket.as_deref() {
        Some(bucket) => BlobStorage::new(bucket).await?,
        None => {
            tracing::warn!("RECEIPTS_BUCKET not set; receipts kept in memory");
            BlobStorage::new_mock()
        }
    };

    // Build shared state
    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(config, store, storage));

    // Build router
    let app = signal_vault::routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signal_vault=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
