// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Debounced last-seen tracking.
//!
//! Each user has at most one pending timer. Activity inside the window
//! aborts the pending timer and schedules a new one, so a burst of requests
//! produces a single `last_seen_at` write once the user goes quiet.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

use crate::services::SharedStore;

/// Pending timer per user, tagged with the generation that scheduled it.
type Timers = Arc<DashMap<String, (u64, AbortHandle)>>;

#[derive(Clone)]
pub struct PresenceTracker {
    store: SharedStore,
    window: Duration,
    timers: Timers,
    generation: Arc<AtomicU64>,
}

impl PresenceTracker {
    pub fn new(store: SharedStore, window: Duration) -> Self {
        Self {
            store,
            window,
            timers: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record activity for `user_id`.
    pub fn touch(&self, user_id: &str) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let store = self.store.clone();
        let timers = self.timers.clone();
        let window = self.window;
        let uid = user_id.to_string();

        let task = tokio::spawn(async move {
            tokio::time::sleep(window).await;

            // Deregister before writing so later activity schedules a fresh
            // timer instead of aborting this write.
            timers.remove_if(&uid, |_, (scheduled, _)| *scheduled == generation);

            if let Err(e) = store.touch_last_seen(&uid, Utc::now()).await {
                tracing::warn!(user_id = %uid, error = %e, "Failed to update last seen");
            }
        });

        if let Some((_, previous)) = self
            .timers
            .insert(user_id.to_string(), (generation, task.abort_handle()))
        {
            previous.abort();
        }
    }

    /// Number of users with a pending write.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}
