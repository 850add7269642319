// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod access_code;
pub mod catalog;
pub mod payment;
pub mod submission;
pub mod user;

pub use access_code::AccessCode;
pub use catalog::ServiceId;
pub use payment::{PaymentRecord, PaymentStatus};
pub use submission::{BrokerSubmission, SubmissionStatus};
pub use user::{Subscription, SubscriptionStatus, User};
