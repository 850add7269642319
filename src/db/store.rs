// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage contract shared by the Firestore and in-memory backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::models::access_code::Redemption;
use crate::models::{
    AccessCode, BrokerSubmission, PaymentRecord, PaymentStatus, ServiceId, SubmissionStatus,
    Subscription, User,
};

/// Document operations the entitlement core needs.
///
/// Subscription writes are scoped to a single `subscriptions.<service>` field
/// so concurrent grants for different services never overwrite each other.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;

    /// Write the profile fields of `user` (not its subscriptions).
    async fn bootstrap_user(&self, user: &User) -> Result<(), AppError>;

    async fn touch_last_seen(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Replace the subscription record for one service.
    async fn put_subscription(
        &self,
        user_id: &str,
        service: ServiceId,
        subscription: &Subscription,
    ) -> Result<(), AppError>;

    // ─── Access Codes ────────────────────────────────────────────

    async fn insert_access_code(&self, code: &AccessCode) -> Result<(), AppError>;

    /// Find a code document by its (normalized) code value.
    async fn find_access_code(&self, code: &str) -> Result<Option<AccessCode>, AppError>;

    /// Newest codes first.
    async fn list_access_codes(&self, limit: u32) -> Result<Vec<AccessCode>, AppError>;

    /// Atomically consume the code document `code_id` and grant its service
    /// to the redeeming user.
    ///
    /// The code is re-read inside the transaction; `Expired` or `AlreadyUsed`
    /// leave everything untouched. Returns the code in its used state.
    async fn redeem_access_code(
        &self,
        code_id: &str,
        redemption: &Redemption,
    ) -> Result<AccessCode, AppError>;

    // ─── Broker Submissions ──────────────────────────────────────

    async fn insert_submission(&self, submission: &BrokerSubmission) -> Result<(), AppError>;

    async fn get_submission(&self, id: &str) -> Result<Option<BrokerSubmission>, AppError>;

    /// A user's submissions whose status is one of `statuses`, newest first.
    async fn find_submissions(
        &self,
        user_id: &str,
        statuses: &[SubmissionStatus],
    ) -> Result<Vec<BrokerSubmission>, AppError>;

    /// All submissions, optionally filtered by status, newest first.
    async fn list_submissions(
        &self,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<BrokerSubmission>, AppError>;

    async fn update_submission_status(
        &self,
        id: &str,
        status: SubmissionStatus,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    // ─── Payments ────────────────────────────────────────────────

    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<(), AppError>;

    async fn get_payment(&self, id: &str) -> Result<Option<PaymentRecord>, AppError>;

    /// Payments, optionally for one user and/or one status, newest first.
    async fn list_payments(
        &self,
        user_id: Option<&str>,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRecord>, AppError>;

    async fn update_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

/// Document body for a field-scoped subscription write.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SubscriptionPatch {
    pub subscriptions: HashMap<String, Subscription>,
}

impl SubscriptionPatch {
    pub fn single(service: ServiceId, subscription: Subscription) -> Self {
        Self {
            subscriptions: HashMap::from([(service.as_str().to_string(), subscription)]),
        }
    }

    /// Update mask covering only this service's entry.
    pub fn field_path(service: ServiceId) -> String {
        format!("subscriptions.{}", service.as_str())
    }
}

/// Run a store call with an upper bound on its duration.
///
/// A call that does not finish in time is reported as a transient failure.
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Store call timed out");
            Err(AppError::Database(format!(
                "Store call timed out after {:?}",
                timeout
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out_as_transient() {
        let result: Result<(), AppError> = bounded(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_patch_field_path() {
        assert_eq!(
            SubscriptionPatch::field_path(ServiceId::PremiumSignals),
            "subscriptions.premium_signals"
        );
    }

    #[test]
    fn test_patch_reads_back_as_update_body() {
        let t0 = chrono::Utc::now();
        let patch = SubscriptionPatch::single(ServiceId::Mentorship, Subscription::grant(t0, 30));

        let json = serde_json::to_value(&patch).unwrap();
        assert!(json["subscriptions"]["mentorship"]["expires_at"].is_string());

        let back: SubscriptionPatch = serde_json::from_value(json).unwrap();
        assert_eq!(
            back.subscriptions["mentorship"].expires_at,
            patch.subscriptions["mentorship"].expires_at
        );
    }
}
