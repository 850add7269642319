// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Broker account verification submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SubmissionStatus {
    Pending,
    Verified,
    Rejected,
}

impl SubmissionStatus {
    /// Statuses that block a user from submitting again.
    pub const ACTIVE: [SubmissionStatus; 2] = [SubmissionStatus::Pending, SubmissionStatus::Verified];

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Verified => "verified",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker proof stored at `brokerSubmissions/{id}`.
///
/// Rejected submissions are kept; a resubmission is a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSubmission {
    pub id: String,
    pub user_id: String,
    pub user_email: Option<String>,
    pub broker_name: String,
    pub account_number: String,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}
