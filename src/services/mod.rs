// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod access_codes;
pub mod ledger;
pub mod payments;
pub mod presence;
pub mod storage;
pub mod verification;

pub use access_codes::{AccessCodeService, CodeRequest};
pub use ledger::{Entitlement, LedgerService, SubscriptionWatch};
pub use payments::{NewPayment, PaymentService, Receipt};
pub use presence::PresenceTracker;
pub use storage::BlobStorage;
pub use verification::VerificationService;

use crate::db::EntitlementStore;
use std::sync::Arc;

/// Store handle shared by all services.
pub type SharedStore = Arc<dyn EntitlementStore>;
