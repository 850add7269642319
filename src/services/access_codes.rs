// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-code registry: generation and single-use redemption.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ring::rand::SystemRandom;
use std::time::Duration;

use crate::db::bounded;
use crate::error::{AppError, Result};
use crate::models::access_code::{normalize_code, Redemption, CODE_ALPHABET, CODE_LENGTH};
use crate::models::{AccessCode, ServiceId, Subscription};
use crate::random::{new_document_id, random_string};
use crate::services::ledger::{validate_duration, LedgerService};
use crate::services::SharedStore;

/// Attempts at finding an unused code value before giving up.
const MAX_GENERATE_ATTEMPTS: usize = 5;
/// Longest redemption window an admin may request.
pub const MAX_VALIDITY_DAYS: u32 = 365;

/// Parameters for a new code.
#[derive(Debug, Clone)]
pub struct CodeRequest {
    pub service: ServiceId,
    pub duration_days: u32,
    /// How long the code stays redeemable; the configured default if `None`
    pub valid_for_days: Option<u32>,
    pub created_by: Option<String>,
}

#[derive(Clone)]
pub struct AccessCodeService {
    store: SharedStore,
    ledger: LedgerService,
    timeout: Duration,
    default_validity_days: u32,
    rng: SystemRandom,
}

impl AccessCodeService {
    pub fn new(
        store: SharedStore,
        ledger: LedgerService,
        timeout: Duration,
        default_validity_days: u32,
    ) -> Self {
        Self {
            store,
            ledger,
            timeout,
            default_validity_days,
            rng: SystemRandom::new(),
        }
    }

    /// Generate and persist a new unused code.
    pub async fn generate(&self, request: CodeRequest) -> Result<AccessCode> {
        self.generate_at(request, Utc::now()).await
    }

    pub async fn generate_at(&self, request: CodeRequest, now: DateTime<Utc>) -> Result<AccessCode> {
        validate_duration(request.duration_days)?;
        let valid_for_days = request.valid_for_days.unwrap_or(self.default_validity_days);
        if !(1..=MAX_VALIDITY_DAYS).contains(&valid_for_days) {
            return Err(AppError::Validation(format!(
                "Code validity must be between 1 and {} days",
                MAX_VALIDITY_DAYS
            )));
        }

        let code = self.unused_code_value().await?;
        let access_code = AccessCode {
            id: new_document_id()?,
            code,
            service_id: request.service,
            duration_days: request.duration_days,
            expires_at: now + ChronoDuration::days(i64::from(valid_for_days)),
            is_used: false,
            used_by: None,
            used_by_email: None,
            used_at: None,
            created_at: now,
            created_by: request.created_by,
        };

        bounded(self.timeout, self.store.insert_access_code(&access_code)).await?;

        tracing::info!(
            code_id = %access_code.id,
            service = %access_code.service_id,
            duration_days = access_code.duration_days,
            expires_at = %access_code.expires_at,
            "Access code generated"
        );

        Ok(access_code)
    }

    /// Draw code values until one is not already taken.
    async fn unused_code_value(&self) -> Result<String> {
        for attempt in 1..=MAX_GENERATE_ATTEMPTS {
            let candidate = random_string(&self.rng, CODE_ALPHABET, CODE_LENGTH)?;
            let existing = bounded(self.timeout, self.store.find_access_code(&candidate)).await?;
            if existing.is_none() {
                return Ok(candidate);
            }
            tracing::warn!(attempt, "Generated access code collided, retrying");
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "Could not generate a unique access code after {} attempts",
            MAX_GENERATE_ATTEMPTS
        )))
    }

    /// Redeem `raw_code` for `user_id`, returning the granted service.
    pub async fn redeem(
        &self,
        user_id: &str,
        user_email: Option<&str>,
        raw_code: &str,
    ) -> Result<ServiceId> {
        self.redeem_at(user_id, user_email, raw_code, Utc::now())
            .await
    }

    /// Redeem at `now`.
    ///
    /// Consuming the code and granting the subscription commit in one store
    /// transaction; on any failure the code stays unused.
    pub async fn redeem_at(
        &self,
        user_id: &str,
        user_email: Option<&str>,
        raw_code: &str,
        now: DateTime<Utc>,
    ) -> Result<ServiceId> {
        let code = normalize_code(raw_code)?;

        let found = bounded(self.timeout, self.store.find_access_code(&code))
            .await?
            .ok_or_else(|| AppError::NotFound("Access code".to_string()))?;

        let redemption = Redemption {
            user_id: user_id.to_string(),
            user_email: user_email.map(str::to_string),
            at: now,
        };

        let redeemed = match bounded(
            self.timeout,
            self.store.redeem_access_code(&found.id, &redemption),
        )
        .await
        {
            Ok(redeemed) => redeemed,
            Err(err) => {
                tracing::info!(
                    user_id,
                    code_id = %found.id,
                    reason = err.kind(),
                    "Access code redemption refused"
                );
                return Err(err);
            }
        };

        let grant = Subscription::grant(now, redeemed.duration_days);
        self.ledger.publish(user_id, redeemed.service_id, &grant);

        tracing::info!(
            user_id,
            code_id = %redeemed.id,
            service = %redeemed.service_id,
            duration_days = redeemed.duration_days,
            "Access code redeemed"
        );

        Ok(redeemed.service_id)
    }

    /// Most recent codes, for the admin audit view.
    pub async fn list(&self, limit: u32) -> Result<Vec<AccessCode>> {
        bounded(self.timeout, self.store.list_access_codes(limit)).await
    }
}
