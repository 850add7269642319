// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entitlement ledger: the only writer of subscription records and the
//! authority on whether a user may access a service.
//!
//! Live watchers of a user's subscriptions are kept in a map of `watch`
//! channels keyed by user ID. Every grant made by this process (admin grants
//! and code redemptions) is pushed to them, so consumers never need to
//! refetch after a write.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::bounded;
use crate::error::{AppError, Result};
use crate::models::{ServiceId, Subscription, User};
use crate::services::SharedStore;

/// Longest subscription a single grant may create.
pub const MAX_GRANT_DAYS: u32 = 3650;

/// Subscription map as seen by watchers, keyed by service ID string.
pub type SubscriptionMap = HashMap<String, Subscription>;

type Watchers = Arc<DashMap<String, Arc<watch::Sender<SubscriptionMap>>>>;

/// Entitlement state of one catalog service.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Entitlement {
    pub service_id: ServiceId,
    pub title: String,
    pub entitled: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Evaluate every catalog service against `subscriptions` at `as_of`.
///
/// Must be re-evaluated whenever it is shown: a subscription lapses when
/// time passes, without any write.
pub fn entitlement_view(subscriptions: &SubscriptionMap, as_of: DateTime<Utc>) -> Vec<Entitlement> {
    ServiceId::ALL
        .into_iter()
        .map(|service| {
            let sub = subscriptions.get(service.as_str());
            Entitlement {
                service_id: service,
                title: service.title().to_string(),
                entitled: sub.is_some_and(|s| s.is_valid_at(as_of)),
                expires_at: sub.map(|s| s.expires_at),
            }
        })
        .collect()
}

pub(crate) fn validate_duration(duration_days: u32) -> Result<()> {
    if !(1..=MAX_GRANT_DAYS).contains(&duration_days) {
        return Err(AppError::Validation(format!(
            "Duration must be between 1 and {} days",
            MAX_GRANT_DAYS
        )));
    }
    Ok(())
}

/// Live view of one user's subscription map, from [`LedgerService::watch`].
#[derive(Debug)]
pub struct SubscriptionWatch {
    user_id: String,
    watchers: Watchers,
    // Only `None` while dropping.
    receiver: Option<watch::Receiver<SubscriptionMap>>,
}

impl SubscriptionWatch {
    fn receiver(&mut self) -> Result<&mut watch::Receiver<SubscriptionMap>> {
        self.receiver
            .as_mut()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("subscription watch released")))
    }

    /// Wait for the next grant. Fails once the channel has been closed.
    pub async fn changed(&mut self) -> Result<()> {
        self.receiver()?
            .changed()
            .await
            .map_err(|e| AppError::Internal(e.into()))
    }

    /// Current subscription map, marking it seen.
    pub fn current(&mut self) -> Result<SubscriptionMap> {
        Ok(self.receiver()?.borrow_and_update().clone())
    }
}

impl Drop for SubscriptionWatch {
    fn drop(&mut self) {
        drop(self.receiver.take());
        self.watchers
            .remove_if(&self.user_id, |_, sender| sender.receiver_count() == 0);
    }
}

#[derive(Clone)]
pub struct LedgerService {
    store: SharedStore,
    timeout: Duration,
    watchers: Watchers,
}

impl LedgerService {
    pub fn new(store: SharedStore, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            watchers: Arc::new(DashMap::new()),
        }
    }

    /// Grant `service` to `user_id` for `duration_days` starting now.
    pub async fn grant(
        &self,
        user_id: &str,
        service: ServiceId,
        duration_days: u32,
    ) -> Result<Subscription> {
        self.grant_at(user_id, service, duration_days, Utc::now())
            .await
    }

    /// Grant starting at `now`. Any previous record for the same service is
    /// replaced, so remaining time does not stack.
    pub async fn grant_at(
        &self,
        user_id: &str,
        service: ServiceId,
        duration_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        validate_duration(duration_days)?;

        let subscription = Subscription::grant(now, duration_days);
        bounded(
            self.timeout,
            self.store.put_subscription(user_id, service, &subscription),
        )
        .await?;

        tracing::info!(
            user_id,
            service = %service,
            duration_days,
            expires_at = %subscription.expires_at,
            "Subscription granted"
        );

        self.publish(user_id, service, &subscription);
        Ok(subscription)
    }

    /// Load the user, creating the profile on first sign-in.
    ///
    /// Only profile fields are written, so subscriptions granted before the
    /// first bootstrap are kept.
    pub async fn ensure_user(&self, user_id: &str, email: Option<&str>) -> Result<User> {
        let existing = bounded(self.timeout, self.store.get_user(user_id)).await?;
        if let Some(user) = existing.as_ref().filter(|u| u.created_at.is_some()) {
            return Ok(user.clone());
        }

        let now = Utc::now();
        let user = User {
            id: user_id.to_string(),
            email: email.map(str::to_string),
            created_at: Some(now),
            last_seen_at: Some(now),
            subscriptions: existing.map(|u| u.subscriptions).unwrap_or_default(),
        };
        bounded(self.timeout, self.store.bootstrap_user(&user)).await?;

        tracing::info!(user_id, has_email = email.is_some(), "User profile created");
        Ok(user)
    }

    /// Whether `user_id` may access `service` at `as_of`.
    ///
    /// Store failures are returned as errors, never as `false`.
    pub async fn is_entitled(
        &self,
        user_id: &str,
        service: ServiceId,
        as_of: DateTime<Utc>,
    ) -> Result<bool> {
        let user = bounded(self.timeout, self.store.get_user(user_id)).await?;
        Ok(user.is_some_and(|u| u.is_entitled(service, as_of)))
    }

    /// Entitlement state of every catalog service for `user_id`.
    pub async fn entitlements(
        &self,
        user_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Entitlement>> {
        let user = bounded(self.timeout, self.store.get_user(user_id)).await?;
        let subscriptions = user.map(|u| u.subscriptions).unwrap_or_default();
        Ok(entitlement_view(&subscriptions, as_of))
    }

    /// Subscribe to live updates of a user's subscription map.
    ///
    /// The watch starts with the stored state and sees every later grant
    /// made through this service. The user's channel is released when the
    /// last watch for it is dropped, including when the initial read fails.
    pub async fn watch(&self, user_id: &str) -> Result<SubscriptionWatch> {
        // Subscribe under the entry lock so a concurrent release cannot
        // remove the channel between lookup and subscribe.
        let (sender, receiver) = {
            let entry = self
                .watchers
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(watch::channel(SubscriptionMap::new()).0));
            let receiver = entry.subscribe();
            (entry.clone(), receiver)
        };
        let watch = SubscriptionWatch {
            user_id: user_id.to_string(),
            watchers: self.watchers.clone(),
            receiver: Some(receiver),
        };

        let user = bounded(self.timeout, self.store.get_user(user_id)).await?;
        if let Some(user) = user {
            // Entries already in the channel were published after this read
            // started, so they win over the stored copy.
            sender.send_if_modified(|current| {
                let mut changed = false;
                for (service, sub) in user.subscriptions {
                    if !current.contains_key(&service) {
                        current.insert(service, sub);
                        changed = true;
                    }
                }
                changed
            });
        }

        tracing::debug!(user_id, watchers = sender.receiver_count(), "Watching subscriptions");
        Ok(watch)
    }

    /// Push a grant to the user's live watchers, if any.
    pub(crate) fn publish(&self, user_id: &str, service: ServiceId, subscription: &Subscription) {
        if let Some(sender) = self.watchers.get(user_id) {
            sender.send_modify(|current| {
                current.insert(service.as_str().to_string(), subscription.clone());
            });
        }
    }

    /// Number of users with at least one registered watcher channel.
    pub fn watched_users(&self) -> usize {
        self.watchers.len()
    }
}
