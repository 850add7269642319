// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Redeemable access codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::ServiceId;

/// Number of characters in a generated code.
pub const CODE_LENGTH: usize = 8;
/// Characters a code is drawn from.
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Access code stored at `accessCodes/{id}`.
///
/// Lifecycle is `unused -> used`; used codes are kept as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessCode {
    /// Document ID
    pub id: String,
    /// The code users type in (uppercase, unique)
    pub code: String,
    pub service_id: ServiceId,
    /// Length of the subscription granted on redemption
    pub duration_days: u32,
    /// Last moment the code can be redeemed (exclusive)
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_by: Option<String>,
    pub used_by_email: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Admin who generated the code
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Who redeems a code, and when.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub user_id: String,
    pub user_email: Option<String>,
    pub at: DateTime<Utc>,
}

impl AccessCode {
    /// Check whether the code can be redeemed at `now`.
    ///
    /// Expiry is checked before use, so an expired code reports `Expired`
    /// whether or not it was ever redeemed.
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if now >= self.expires_at {
            return Err(AppError::Expired);
        }
        if self.is_used {
            return Err(AppError::AlreadyUsed);
        }
        Ok(())
    }

    /// Transition to the terminal used state.
    pub fn mark_used(&mut self, redemption: &Redemption) {
        self.is_used = true;
        self.used_by = Some(redemption.user_id.clone());
        self.used_by_email = redemption.user_email.clone();
        self.used_at = Some(redemption.at);
    }
}

/// Normalize user input into a code, rejecting malformed values locally.
pub fn normalize_code(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(AppError::Validation("Access code is required".to_string()));
    }
    if code.len() != CODE_LENGTH || !code.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
        return Err(AppError::Validation(format!(
            "Access code must be {} letters or digits",
            CODE_LENGTH
        )));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn code_at(created: DateTime<Utc>) -> AccessCode {
        AccessCode {
            id: "doc1".to_string(),
            code: "XJ4K9QZT".to_string(),
            service_id: ServiceId::PremiumSignals,
            duration_days: 30,
            expires_at: created + Duration::days(30),
            is_used: false,
            used_by: None,
            used_by_email: None,
            used_at: None,
            created_at: created,
            created_by: None,
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  xj4k9qzt ").unwrap(), "XJ4K9QZT");
        assert!(matches!(normalize_code("   "), Err(AppError::Validation(_))));
        assert!(matches!(normalize_code("ABC"), Err(AppError::Validation(_))));
        assert!(matches!(
            normalize_code("XJ4K-QZT"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_redeemable_until_expiry() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let code = code_at(t0);

        assert!(code.check_redeemable(t0).is_ok());
        assert!(matches!(
            code.check_redeemable(code.expires_at),
            Err(AppError::Expired)
        ));
    }

    #[test]
    fn test_used_code_rejected_and_expiry_wins() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut code = code_at(t0);
        code.mark_used(&Redemption {
            user_id: "u1".to_string(),
            user_email: None,
            at: t0,
        });

        assert_eq!(code.used_by.as_deref(), Some("u1"));
        assert_eq!(code.used_at, Some(t0));
        assert!(matches!(
            code.check_redeemable(t0 + Duration::days(1)),
            Err(AppError::AlreadyUsed)
        ));
        assert!(matches!(
            code.check_redeemable(t0 + Duration::days(31)),
            Err(AppError::Expired)
        ));
    }
}
