// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model and the subscriptions embedded in it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::ServiceId;

/// User profile stored in Firestore at `users/{uid}`.
///
/// Every field defaults so a document that so far only received a
/// field-scoped subscription write still loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    /// Identity provider user ID (also used as document ID)
    #[serde(default)]
    pub id: String,
    /// Email address (social sign-in may not provide one)
    #[serde(default)]
    pub email: Option<String>,
    /// When the profile was bootstrapped
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Debounced activity timestamp
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Subscription per service, keyed by `ServiceId::as_str()`
    #[serde(default)]
    pub subscriptions: HashMap<String, Subscription>,
}

impl User {
    pub fn subscription(&self, service: ServiceId) -> Option<&Subscription> {
        self.subscriptions.get(service.as_str())
    }

    /// Whether the user may access `service` at `as_of`.
    pub fn is_entitled(&self, service: ServiceId, as_of: DateTime<Utc>) -> bool {
        self.subscription(service)
            .is_some_and(|sub| sub.is_valid_at(as_of))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
}

/// One service subscription. A new grant replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Subscription {
    /// Fresh grant starting at `now`. Remaining time on an older record is
    /// not carried over.
    pub fn grant(now: DateTime<Utc>, duration_days: u32) -> Self {
        Self {
            status: SubscriptionStatus::Active,
            started_at: now,
            expires_at: now + Duration::days(i64::from(duration_days)),
        }
    }

    /// Expiry is purely time based: valid strictly before `expires_at`.
    pub fn is_valid_at(&self, as_of: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && as_of < self.expires_at
    }
}
