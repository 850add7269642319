// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-code generation and redemption against the in-memory store.

use chrono::Duration;
use signal_vault::db::{EntitlementStore, MemoryStore};
use signal_vault::error::AppError;
use signal_vault::models::{AccessCode, ServiceId};
use signal_vault::services::CodeRequest;
use std::collections::HashSet;
use std::sync::Arc;

mod common;
use common::{state_with_store, t0};

fn request(service: ServiceId, duration_days: u32) -> CodeRequest {
    CodeRequest {
        service,
        duration_days,
        valid_for_days: None,
        created_by: Some("admin-uid".to_string()),
    }
}

/// Store a code with a known value, as if an admin had generated it at T0.
async fn seed_code(state: &signal_vault::AppState, code: &str, valid_for_days: i64) -> AccessCode {
    let access_code = AccessCode {
        id: format!("doc-{}", code),
        code: code.to_string(),
        service_id: ServiceId::PremiumSignals,
        duration_days: 30,
        expires_at: t0() + Duration::days(valid_for_days),
        is_used: false,
        used_by: None,
        used_by_email: None,
        used_at: None,
        created_at: t0(),
        created_by: None,
    };
    state.store.insert_access_code(&access_code).await.unwrap();
    access_code
}

#[tokio::test]
async fn test_redeem_grants_until_exclusive_expiry() {
    let state = state_with_store(Arc::new(MemoryStore::new()));
    seed_code(&state, "XJ4K9QZT", 30).await;

    let redeemed_at = t0() + Duration::days(1);
    let service = state
        .access_codes
        .redeem_at("user-1", Some("user-1@example.com"), "XJ4K9QZT", redeemed_at)
        .await
        .unwrap();
    assert_eq!(service, ServiceId::PremiumSignals);

    let ledger = &state.ledger;
    let service = ServiceId::PremiumSignals;
    assert!(ledger.is_entitled("user-1", service, redeemed_at).await.unwrap());
    assert!(ledger
        .is_entitled("user-1", service, t0() + Duration::days(31) - Duration::seconds(1))
        .await
        .unwrap());
    assert!(!ledger
        .is_entitled("user-1", service, t0() + Duration::days(31))
        .await
        .unwrap());
    assert!(!ledger
        .is_entitled("user-1", service, t0() + Duration::days(40))
        .await
        .unwrap());

    // Other services are untouched
    assert!(!ledger
        .is_entitled("user-1", ServiceId::Mentorship, redeemed_at)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_redeem_records_audit_fields() {
    let state = state_with_store(Arc::new(MemoryStore::new()));
    seed_code(&state, "AUDIT123", 30).await;

    let at = t0() + Duration::hours(2);
    state
        .access_codes
        .redeem_at("user-7", Some("seven@example.com"), "audit123", at)
        .await
        .unwrap();

    let stored = state
        .store
        .find_access_code("AUDIT123")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_used);
    assert_eq!(stored.used_by.as_deref(), Some("user-7"));
    assert_eq!(stored.used_by_email.as_deref(), Some("seven@example.com"));
    assert_eq!(stored.used_at, Some(at));
}

#[tokio::test]
async fn test_second_redeem_is_already_used() {
    let state = state_with_store(Arc::new(MemoryStore::new()));
    seed_code(&state, "ONCEONLY", 30).await;
    let at = t0() + Duration::days(1);

    state
        .access_codes
        .redeem_at("user-1", None, "ONCEONLY", at)
        .await
        .unwrap();

    let same_user = state
        .access_codes
        .redeem_at("user-1", None, "ONCEONLY", at)
        .await
        .unwrap_err();
    assert!(matches!(same_user, AppError::AlreadyUsed));

    let other_user = state
        .access_codes
        .redeem_at("user-2", None, "ONCEONLY", at)
        .await
        .unwrap_err();
    assert!(matches!(other_user, AppError::AlreadyUsed));

    assert!(!state
        .ledger
        .is_entitled("user-2", ServiceId::PremiumSignals, at)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_expired_code_reports_expired_even_when_used() {
    let state = state_with_store(Arc::new(MemoryStore::new()));
    seed_code(&state, "SHORTONE", 2).await;

    // Unused and past expiry
    let late = t0() + Duration::days(2);
    let err = state
        .access_codes
        .redeem_at("user-1", None, "SHORTONE", late)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Expired));

    // Used, then past expiry
    seed_code(&state, "USEDLATE", 2).await;
    state
        .access_codes
        .redeem_at("user-1", None, "USEDLATE", t0() + Duration::days(1))
        .await
        .unwrap();
    let err = state
        .access_codes
        .redeem_at("user-2", None, "USEDLATE", late)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Expired));
}

#[tokio::test]
async fn test_unknown_and_malformed_codes() {
    let state = state_with_store(Arc::new(MemoryStore::new()));

    let missing = state
        .access_codes
        .redeem("user-1", None, "NOSUCH99")
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));

    for bad in ["", "   ", "SHORT", "TOOLONGCODE1", "AB-CD-EF"] {
        let err = state
            .access_codes
            .redeem("user-1", None, bad)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "input {:?}", bad);
    }
}

#[tokio::test]
async fn test_generated_codes_are_distinct_and_well_formed() {
    let state = state_with_store(Arc::new(MemoryStore::new()));

    let mut seen = HashSet::new();
    for _ in 0..20 {
        let code = state
            .access_codes
            .generate_at(request(ServiceId::PremiumSignals, 30), t0())
            .await
            .unwrap();
        assert_eq!(code.code.len(), 8);
        assert!(code
            .code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        assert!(!code.is_used);
        assert_eq!(code.expires_at, t0() + Duration::days(30));
        assert!(seen.insert(code.code));
    }

    let listed = state.access_codes.list(100).await.unwrap();
    assert_eq!(listed.len(), 20);
}

#[tokio::test]
async fn test_generate_validates_durations() {
    let state = state_with_store(Arc::new(MemoryStore::new()));

    let zero = state
        .access_codes
        .generate(request(ServiceId::ElitePremium, 0))
        .await
        .unwrap_err();
    assert!(matches!(zero, AppError::Validation(_)));

    let mut long_window = request(ServiceId::ElitePremium, 30);
    long_window.valid_for_days = Some(10_000);
    let err = state.access_codes.generate(long_window).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_generated_code_round_trip_through_redeem() {
    let state = state_with_store(Arc::new(MemoryStore::new()));

    let code = state
        .access_codes
        .generate_at(request(ServiceId::PremiumEa, 7), t0())
        .await
        .unwrap();

    let at = t0() + Duration::days(3);
    let service = state
        .access_codes
        .redeem_at("user-9", None, &code.code.to_lowercase(), at)
        .await
        .unwrap();
    assert_eq!(service, ServiceId::PremiumEa);
    assert!(state
        .ledger
        .is_entitled("user-9", ServiceId::PremiumEa, at + Duration::days(6))
        .await
        .unwrap());
    assert!(!state
        .ledger
        .is_entitled("user-9", ServiceId::PremiumEa, at + Duration::days(7))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_concurrent_redeem_succeeds_exactly_once() {
    let state = state_with_store(Arc::new(MemoryStore::new()));
    let code = state
        .access_codes
        .generate(request(ServiceId::Mentorship, 30))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let state = state.clone();
        let value = code.code.clone();
        handles.push(tokio::spawn(async move {
            state
                .access_codes
                .redeem(&format!("racer-{}", i), None, &value)
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::AlreadyUsed) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(successes, 1);
}
