// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: the store trait and its Firestore and in-memory backends.

pub mod firestore;
pub mod memory;
pub mod store;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;
pub use store::{bounded, EntitlementStore};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const ACCESS_CODES: &str = "accessCodes";
    pub const BROKER_SUBMISSIONS: &str = "brokerSubmissions";
    pub const PAYMENTS: &str = "payments";
}
