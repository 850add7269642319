// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile + subscriptions map)
//! - Access codes (generation and transactional redemption)
//! - Broker submissions (verification workflow)
//! - Payments (manual payment claims)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::{BackoffError, FirestoreError};
use firestore::{paths, FirestoreQueryDirection};
use serde::{Deserialize, Serialize};

use crate::db::collections;
use crate::db::store::{EntitlementStore, SubscriptionPatch};
use crate::error::AppError;
use crate::models::access_code::Redemption;
use crate::models::{
    AccessCode, BrokerSubmission, PaymentRecord, PaymentStatus, ServiceId, SubmissionStatus,
    Subscription, User,
};

/// Body for status-only updates on submissions and payments.
#[derive(Serialize, Deserialize)]
struct StatusPatch<S> {
    status: S,
    reviewed_at: DateTime<Utc>,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn set_status<S>(
        &self,
        collection: &str,
        id: &str,
        status: S,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), AppError>
    where
        S: Serialize + for<'de> Deserialize<'de> + Send + Sync,
    {
        let patch = StatusPatch {
            status,
            reviewed_at,
        };
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(["status", "reviewed_at"])
            .in_col(collection)
            .document_id(id)
            .object(&patch)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl EntitlementStore for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn bootstrap_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(User::{id, email, created_at, last_seen_at}))
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn touch_last_seen(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let patch = User {
            last_seen_at: Some(at),
            ..Default::default()
        };
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(User::{last_seen_at}))
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(&patch)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn put_subscription(
        &self,
        user_id: &str,
        service: ServiceId,
        subscription: &Subscription,
    ) -> Result<(), AppError> {
        let patch = SubscriptionPatch::single(service, subscription.clone());
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields([SubscriptionPatch::field_path(service)])
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(&patch)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Access Code Operations ──────────────────────────────────

    async fn insert_access_code(&self, code: &AccessCode) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACCESS_CODES)
            .document_id(&code.id)
            .object(code)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_access_code(&self, code: &str) -> Result<Option<AccessCode>, AppError> {
        let code = code.to_string();
        let mut matches: Vec<AccessCode> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACCESS_CODES)
            .filter(move |q| q.for_all([q.field("code").eq(code.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(matches.pop())
    }

    async fn list_access_codes(&self, limit: u32) -> Result<Vec<AccessCode>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACCESS_CODES)
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Uses `run_transaction`, so a concurrent redemption of the same code
    /// makes Firestore retry this one against fresh data, where it then sees
    /// `is_used` and fails with `AlreadyUsed`.
    async fn redeem_access_code(
        &self,
        code_id: &str,
        redemption: &Redemption,
    ) -> Result<AccessCode, AppError> {
        let client = self.get_client()?;
        let code_id = code_id.to_string();
        let redemption = redemption.clone();

        let outcome = client
            .run_transaction(|db, transaction| {
                let code_id = code_id.clone();
                let redemption = redemption.clone();

                Box::pin(async move {
                    // Read inside the transaction so the code is registered
                    // for conflict detection.
                    let current: Option<AccessCode> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::ACCESS_CODES)
                        .obj()
                        .one(&code_id)
                        .await?;

                    let Some(mut code) = current else {
                        return Ok(Err(AppError::NotFound("Access code".to_string())));
                    };
                    if let Err(rejection) = code.check_redeemable(redemption.at) {
                        return Ok(Err(rejection));
                    }

                    code.mark_used(&redemption);
                    db.fluent()
                        .update()
                        .fields(paths!(AccessCode::{is_used, used_by, used_by_email, used_at}))
                        .in_col(collections::ACCESS_CODES)
                        .document_id(&code_id)
                        .object(&code)
                        .add_to_transaction(transaction)?;

                    let grant = Subscription::grant(redemption.at, code.duration_days);
                    let patch = SubscriptionPatch::single(code.service_id, grant);
                    db.fluent()
                        .update()
                        .fields([SubscriptionPatch::field_path(code.service_id)])
                        .in_col(collections::USERS)
                        .document_id(&redemption.user_id)
                        .object(&patch)
                        .add_to_transaction(transaction)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok(code))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Redemption transaction failed: {}", e)))?;

        outcome
    }

    // ─── Broker Submission Operations ────────────────────────────

    async fn insert_submission(&self, submission: &BrokerSubmission) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::BROKER_SUBMISSIONS)
            .document_id(&submission.id)
            .object(submission)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_submission(&self, id: &str) -> Result<Option<BrokerSubmission>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::BROKER_SUBMISSIONS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_submissions(
        &self,
        user_id: &str,
        statuses: &[SubmissionStatus],
    ) -> Result<Vec<BrokerSubmission>, AppError> {
        let user_id = user_id.to_string();
        let statuses: Vec<&'static str> = statuses.iter().map(|s| s.as_str()).collect();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::BROKER_SUBMISSIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("status").is_in(statuses.clone()),
                ])
            })
            .order_by([("submitted_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_submissions(
        &self,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<BrokerSubmission>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::BROKER_SUBMISSIONS)
            .filter(move |q| q.for_all([status.and_then(|s| q.field("status").eq(s.as_str()))]))
            .order_by([("submitted_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update_submission_status(
        &self,
        id: &str,
        status: SubmissionStatus,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.set_status(collections::BROKER_SUBMISSIONS, id, status, reviewed_at)
            .await
    }

    // ─── Payment Operations ──────────────────────────────────────

    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PAYMENTS)
            .document_id(&payment.id)
            .object(payment)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_payment(&self, id: &str) -> Result<Option<PaymentRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PAYMENTS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_payments(
        &self,
        user_id: Option<&str>,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRecord>, AppError> {
        let user_id = user_id.map(str::to_string);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::PAYMENTS)
            .filter(move |q| {
                q.for_all([
                    user_id.clone().and_then(|id| q.field("user_id").eq(id)),
                    status.and_then(|s| q.field("status").eq(s.as_str())),
                ])
            })
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.set_status(collections::PAYMENTS, id, status, reviewed_at)
            .await
    }
}
