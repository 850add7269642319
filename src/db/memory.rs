// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store.
//!
//! Used for local runs without GCP and by the test suite. A single lock
//! covers all collections, which makes every operation (including the
//! redemption read-check-write) atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::db::store::EntitlementStore;
use crate::error::AppError;
use crate::models::access_code::Redemption;
use crate::models::{
    AccessCode, BrokerSubmission, PaymentRecord, PaymentStatus, ServiceId, SubmissionStatus,
    Subscription, User,
};

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    // Insertion order is kept so equal timestamps list deterministically.
    access_codes: Vec<AccessCode>,
    submissions: Vec<BrokerSubmission>,
    payments: Vec<PaymentRecord>,
}

/// In-memory implementation of [`EntitlementStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn user_mut<'a>(users: &'a mut HashMap<String, User>, user_id: &str) -> &'a mut User {
    users.entry(user_id.to_string()).or_insert_with(|| User {
        id: user_id.to_string(),
        ..User::default()
    })
}

fn newest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.reverse();
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl EntitlementStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.inner.lock().await.users.get(user_id).cloned())
    }

    async fn bootstrap_user(&self, user: &User) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let entry = user_mut(&mut inner.users, &user.id);
        entry.id = user.id.clone();
        entry.email = user.email.clone();
        entry.created_at = user.created_at;
        entry.last_seen_at = user.last_seen_at;
        Ok(())
    }

    async fn touch_last_seen(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        user_mut(&mut inner.users, user_id).last_seen_at = Some(at);
        Ok(())
    }

    async fn put_subscription(
        &self,
        user_id: &str,
        service: ServiceId,
        subscription: &Subscription,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        user_mut(&mut inner.users, user_id)
            .subscriptions
            .insert(service.as_str().to_string(), subscription.clone());
        Ok(())
    }

    async fn insert_access_code(&self, code: &AccessCode) -> Result<(), AppError> {
        self.inner.lock().await.access_codes.push(code.clone());
        Ok(())
    }

    async fn find_access_code(&self, code: &str) -> Result<Option<AccessCode>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.access_codes.iter().find(|c| c.code == code).cloned())
    }

    async fn list_access_codes(&self, limit: u32) -> Result<Vec<AccessCode>, AppError> {
        let codes = self.inner.lock().await.access_codes.clone();
        let mut codes = newest_first(codes, |c| c.created_at);
        codes.truncate(limit as usize);
        Ok(codes)
    }

    async fn redeem_access_code(
        &self,
        code_id: &str,
        redemption: &Redemption,
    ) -> Result<AccessCode, AppError> {
        let mut inner = self.inner.lock().await;

        let code = inner
            .access_codes
            .iter_mut()
            .find(|c| c.id == code_id)
            .ok_or_else(|| AppError::NotFound("Access code".to_string()))?;
        code.check_redeemable(redemption.at)?;
        code.mark_used(redemption);
        let code = code.clone();

        let grant = Subscription::grant(redemption.at, code.duration_days);
        user_mut(&mut inner.users, &redemption.user_id)
            .subscriptions
            .insert(code.service_id.as_str().to_string(), grant);

        Ok(code)
    }

    async fn insert_submission(&self, submission: &BrokerSubmission) -> Result<(), AppError> {
        self.inner.lock().await.submissions.push(submission.clone());
        Ok(())
    }

    async fn get_submission(&self, id: &str) -> Result<Option<BrokerSubmission>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn find_submissions(
        &self,
        user_id: &str,
        statuses: &[SubmissionStatus],
    ) -> Result<Vec<BrokerSubmission>, AppError> {
        let inner = self.inner.lock().await;
        let found = inner
            .submissions
            .iter()
            .filter(|s| s.user_id == user_id && statuses.contains(&s.status))
            .cloned()
            .collect();
        Ok(newest_first(found, |s| s.submitted_at))
    }

    async fn list_submissions(
        &self,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<BrokerSubmission>, AppError> {
        let inner = self.inner.lock().await;
        let found = inner
            .submissions
            .iter()
            .filter(|s| status.is_none_or(|wanted| s.status == wanted))
            .cloned()
            .collect();
        Ok(newest_first(found, |s| s.submitted_at))
    }

    async fn update_submission_status(
        &self,
        id: &str,
        status: SubmissionStatus,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let submission = inner
            .submissions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Submission {}", id)))?;
        submission.status = status;
        submission.reviewed_at = Some(reviewed_at);
        Ok(())
    }

    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<(), AppError> {
        self.inner.lock().await.payments.push(payment.clone());
        Ok(())
    }

    async fn get_payment(&self, id: &str) -> Result<Option<PaymentRecord>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn list_payments(
        &self,
        user_id: Option<&str>,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRecord>, AppError> {
        let inner = self.inner.lock().await;
        let found = inner
            .payments
            .iter()
            .filter(|p| user_id.is_none_or(|id| p.user_id == id))
            .filter(|p| status.is_none_or(|wanted| p.status == wanted))
            .cloned()
            .collect();
        Ok(newest_first(found, |p| p.created_at))
    }

    async fn update_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let payment = inner
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Payment {}", id)))?;
        payment.status = status;
        payment.reviewed_at = Some(reviewed_at);
        Ok(())
    }
}
