// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment intake: records manual payment claims for admin review.
//!
//! Marking a payment completed never grants a subscription; admins issue a
//! code or grant through the ledger separately.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::db::bounded;
use crate::error::{AppError, Result};
use crate::models::{PaymentRecord, PaymentStatus, ServiceId};
use crate::random::new_document_id;
use crate::services::storage::BlobStorage;
use crate::services::SharedStore;

/// Largest receipt accepted, in bytes.
pub const MAX_RECEIPT_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_RECEIPT_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/webp", "application/pdf"];

/// Proof-of-payment file attached to a claim.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A payment claim as submitted by a user.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub service: ServiceId,
    pub price_amount: f64,
    pub payment_method: String,
    pub sender_name: Option<String>,
    pub receipt: Option<Receipt>,
}

#[derive(Clone)]
pub struct PaymentService {
    store: SharedStore,
    storage: BlobStorage,
    timeout: Duration,
}

/// Keep object names to a safe character set.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(80)
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "receipt".to_string()
    } else {
        cleaned
    }
}

fn validate(payment: &NewPayment) -> Result<()> {
    if !payment.price_amount.is_finite() || payment.price_amount <= 0.0 {
        return Err(AppError::Validation(
            "Price amount must be a positive number".to_string(),
        ));
    }
    if payment.payment_method.trim().is_empty() {
        return Err(AppError::Validation("Payment method is required".to_string()));
    }
    if let Some(receipt) = &payment.receipt {
        if receipt.data.is_empty() {
            return Err(AppError::Validation("Receipt file is empty".to_string()));
        }
        if receipt.data.len() > MAX_RECEIPT_BYTES {
            return Err(AppError::Validation(format!(
                "Receipt must be at most {} MB",
                MAX_RECEIPT_BYTES / (1024 * 1024)
            )));
        }
        if !ALLOWED_RECEIPT_TYPES.contains(&receipt.content_type.as_str()) {
            return Err(AppError::Validation(format!(
                "Unsupported receipt type: {}",
                receipt.content_type
            )));
        }
    }
    Ok(())
}

impl PaymentService {
    pub fn new(store: SharedStore, storage: BlobStorage, timeout: Duration) -> Self {
        Self {
            store,
            storage,
            timeout,
        }
    }

    /// Record a payment claim, uploading the receipt first if present.
    pub async fn submit(
        &self,
        user_id: &str,
        user_email: Option<&str>,
        payment: NewPayment,
    ) -> Result<PaymentRecord> {
        self.submit_at(user_id, user_email, payment, Utc::now())
            .await
    }

    pub async fn submit_at(
        &self,
        user_id: &str,
        user_email: Option<&str>,
        payment: NewPayment,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord> {
        validate(&payment)?;
        let id = new_document_id()?;

        let receipt_url = match payment.receipt {
            Some(receipt) => {
                let path = format!(
                    "receipts/{}/{}-{}",
                    user_id,
                    id,
                    sanitize_file_name(&receipt.file_name)
                );
                let blob = bounded(
                    self.timeout,
                    self.storage
                        .upload(&path, receipt.data, &receipt.content_type),
                )
                .await?;
                Some(self.storage.download_url(&blob))
            }
            None => None,
        };

        let record = PaymentRecord {
            id,
            user_id: user_id.to_string(),
            user_email: user_email.map(str::to_string),
            service_id: payment.service,
            service_title: payment.service.title().to_string(),
            price_amount: payment.price_amount,
            payment_method: payment.payment_method.trim().to_string(),
            sender_name: payment
                .sender_name
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            receipt_url,
            status: PaymentStatus::Pending,
            created_at: now,
            reviewed_at: None,
        };
        bounded(self.timeout, self.store.insert_payment(&record)).await?;

        tracing::info!(
            user_id,
            payment_id = %record.id,
            service = %record.service_id,
            method = %record.payment_method,
            has_receipt = record.receipt_url.is_some(),
            "Payment submitted"
        );

        Ok(record)
    }

    /// Admin status change.
    pub async fn set_status(&self, payment_id: &str, status: PaymentStatus) -> Result<()> {
        let existing = bounded(self.timeout, self.store.get_payment(payment_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {}", payment_id)))?;

        bounded(
            self.timeout,
            self.store
                .update_payment_status(payment_id, status, Utc::now()),
        )
        .await?;

        tracing::info!(
            payment_id,
            user_id = %existing.user_id,
            from = %existing.status,
            to = %status,
            "Payment status updated"
        );
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<PaymentRecord>> {
        bounded(self.timeout, self.store.list_payments(Some(user_id), None)).await
    }

    pub async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<PaymentRecord>> {
        bounded(self.timeout, self.store.list_payments(None, status)).await
    }
}
