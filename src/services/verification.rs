// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Broker account verification workflow.
//!
//! A user may have at most one submission that is pending or verified.
//! The check runs as a query followed by an insert, outside any transaction:
//! two submissions racing from the same user can both pass the check. That
//! is accepted for this workflow; a caller that needs the guarantee must run
//! check and insert inside a store transaction.
//!
//! Reviews overwrite the status unconditionally. In particular a verified
//! submission can be marked rejected, which lets the user submit again.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::db::bounded;
use crate::error::{AppError, Result};
use crate::models::{BrokerSubmission, SubmissionStatus};
use crate::random::new_document_id;
use crate::services::SharedStore;

const MAX_BROKER_NAME_LEN: usize = 100;
const MAX_ACCOUNT_NUMBER_LEN: usize = 64;

#[derive(Clone)]
pub struct VerificationService {
    store: SharedStore,
    timeout: Duration,
}

fn required_field(value: &str, name: &str, max_len: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", name)));
    }
    if value.chars().count() > max_len {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            name, max_len
        )));
    }
    Ok(value.to_string())
}

impl VerificationService {
    pub fn new(store: SharedStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Submit a broker account for review.
    pub async fn submit(
        &self,
        user_id: &str,
        user_email: Option<&str>,
        broker_name: &str,
        account_number: &str,
    ) -> Result<BrokerSubmission> {
        self.submit_at(user_id, user_email, broker_name, account_number, Utc::now())
            .await
    }

    pub async fn submit_at(
        &self,
        user_id: &str,
        user_email: Option<&str>,
        broker_name: &str,
        account_number: &str,
        now: DateTime<Utc>,
    ) -> Result<BrokerSubmission> {
        let broker_name = required_field(broker_name, "Broker name", MAX_BROKER_NAME_LEN)?;
        let account_number =
            required_field(account_number, "Account number", MAX_ACCOUNT_NUMBER_LEN)?;

        let active = bounded(
            self.timeout,
            self.store
                .find_submissions(user_id, &SubmissionStatus::ACTIVE),
        )
        .await?;
        if let Some(existing) = active.first() {
            tracing::info!(
                user_id,
                submission_id = %existing.id,
                status = %existing.status,
                "Verification submission blocked by active submission"
            );
            return Err(AppError::DuplicateActiveSubmission);
        }

        let submission = BrokerSubmission {
            id: new_document_id()?,
            user_id: user_id.to_string(),
            user_email: user_email.map(str::to_string),
            broker_name,
            account_number,
            status: SubmissionStatus::Pending,
            submitted_at: now,
            reviewed_at: None,
        };
        bounded(self.timeout, self.store.insert_submission(&submission)).await?;

        tracing::info!(
            user_id,
            submission_id = %submission.id,
            broker = %submission.broker_name,
            "Verification submitted"
        );

        Ok(submission)
    }

    /// Record an admin decision on a submission.
    pub async fn review(&self, submission_id: &str, status: SubmissionStatus) -> Result<()> {
        if status == SubmissionStatus::Pending {
            return Err(AppError::Validation(
                "Review status must be 'verified' or 'rejected'".to_string(),
            ));
        }

        let existing = bounded(self.timeout, self.store.get_submission(submission_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submission {}", submission_id)))?;

        bounded(
            self.timeout,
            self.store
                .update_submission_status(submission_id, status, Utc::now()),
        )
        .await?;

        if existing.status == SubmissionStatus::Verified && status == SubmissionStatus::Rejected {
            tracing::warn!(
                submission_id,
                user_id = %existing.user_id,
                "Verified submission rejected; user may submit again"
            );
        }
        tracing::info!(
            submission_id,
            user_id = %existing.user_id,
            from = %existing.status,
            to = %status,
            "Verification reviewed"
        );

        Ok(())
    }

    /// A user's own submissions, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<BrokerSubmission>> {
        bounded(
            self.timeout,
            self.store.find_submissions(
                user_id,
                &[
                    SubmissionStatus::Pending,
                    SubmissionStatus::Verified,
                    SubmissionStatus::Rejected,
                ],
            ),
        )
        .await
    }

    /// Admin review queue.
    pub async fn list(&self, status: Option<SubmissionStatus>) -> Result<Vec<BrokerSubmission>> {
        bounded(self.timeout, self.store.list_submissions(status)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_field_trims_and_bounds() {
        assert_eq!(required_field("  Exness ", "Broker", 10).unwrap(), "Exness");
        assert!(matches!(
            required_field("   ", "Broker", 10),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            required_field("ABCDEFGHIJK", "Broker", 10),
            Err(AppError::Validation(_))
        ));
    }
}
