// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signal Vault: entitlement backend for a subscription-gated signals site
//!
//! This crate provides the API for redeeming access codes, checking
//! subscriptions, reviewing broker verifications and recording payments.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod random;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{
    AccessCodeService, BlobStorage, LedgerService, PaymentService, PresenceTracker, SharedStore,
    VerificationService,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: SharedStore,
    pub ledger: LedgerService,
    pub access_codes: AccessCodeService,
    pub verification: VerificationService,
    pub payments: PaymentService,
    pub presence: PresenceTracker,
}

impl AppState {
    /// Wire all services onto one store.
    pub fn new(config: Config, store: SharedStore, storage: BlobStorage) -> Self {
        let timeout = config.store_timeout;
        let ledger = LedgerService::new(store.clone(), timeout);
        let access_codes = AccessCodeService::new(
            store.clone(),
            ledger.clone(),
            timeout,
            config.code_validity_days,
        );
        let verification = VerificationService::new(store.clone(), timeout);
        let payments = PaymentService::new(store.clone(), storage, timeout);
        let presence = PresenceTracker::new(store.clone(), config.last_seen_debounce);

        Self {
            config,
            store,
            ledger,
            access_codes,
            verification,
            payments,
            presence,
        }
    }
}
