// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Broker verification workflow.

use signal_vault::db::{EntitlementStore, MemoryStore};
use signal_vault::error::AppError;
use signal_vault::models::SubmissionStatus;
use std::sync::Arc;

mod common;
use common::state_with_store;

#[tokio::test]
async fn test_verify_blocks_then_reject_reopens() {
    let state = state_with_store(Arc::new(MemoryStore::new()));
    let workflow = &state.verification;

    let first = workflow
        .submit("user-1", Some("u1@example.com"), "Exness", "12345678")
        .await
        .unwrap();
    assert_eq!(first.status, SubmissionStatus::Pending);

    workflow
        .review(&first.id, SubmissionStatus::Verified)
        .await
        .unwrap();

    let blocked = workflow
        .submit("user-1", Some("u1@example.com"), "Exness", "87654321")
        .await
        .unwrap_err();
    assert!(matches!(blocked, AppError::DuplicateActiveSubmission));

    workflow
        .review(&first.id, SubmissionStatus::Rejected)
        .await
        .unwrap();

    let second = workflow
        .submit("user-1", Some("u1@example.com"), "IC Markets", "87654321")
        .await
        .unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.status, SubmissionStatus::Pending);

    // The rejected submission is kept as is
    let old = state.store.get_submission(&first.id).await.unwrap().unwrap();
    assert_eq!(old.status, SubmissionStatus::Rejected);
    assert!(old.reviewed_at.is_some());
    assert_eq!(workflow.list_for_user("user-1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_pending_submission_blocks_second() {
    let state = state_with_store(Arc::new(MemoryStore::new()));

    state
        .verification
        .submit("user-1", None, "Exness", "111")
        .await
        .unwrap();
    let err = state
        .verification
        .submit("user-1", None, "XM", "222")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateActiveSubmission));

    // Other users are unaffected
    state
        .verification
        .submit("user-2", None, "XM", "222")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_submit_requires_fields() {
    let state = state_with_store(Arc::new(MemoryStore::new()));

    let err = state
        .verification
        .submit("user-1", None, "  ", "111")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = state
        .verification
        .submit("user-1", None, "Exness", "")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(state
        .verification
        .list_for_user("user-1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_review_edge_cases() {
    let state = state_with_store(Arc::new(MemoryStore::new()));

    let missing = state
        .verification
        .review("no-such-id", SubmissionStatus::Verified)
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));

    let submission = state
        .verification
        .submit("user-1", None, "Exness", "111")
        .await
        .unwrap();
    let pending = state
        .verification
        .review(&submission.id, SubmissionStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(pending, AppError::Validation(_)));

    // Rejected back to verified is allowed too
    state
        .verification
        .review(&submission.id, SubmissionStatus::Rejected)
        .await
        .unwrap();
    state
        .verification
        .review(&submission.id, SubmissionStatus::Verified)
        .await
        .unwrap();

    let queue = state
        .verification
        .list(Some(SubmissionStatus::Verified))
        .await
        .unwrap();
    assert_eq!(queue.len(), 1);
    assert!(state
        .verification
        .list(Some(SubmissionStatus::Pending))
        .await
        .unwrap()
        .is_empty());
}
