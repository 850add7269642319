// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Catalog of purchasable services.
//!
//! Every component that needs a service identifier or display title reads it
//! from here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A purchasable capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ServiceId {
    PremiumSignals,
    ElitePremium,
    PremiumEa,
    Mentorship,
}

impl ServiceId {
    pub const ALL: [ServiceId; 4] = [
        ServiceId::PremiumSignals,
        ServiceId::ElitePremium,
        ServiceId::PremiumEa,
        ServiceId::Mentorship,
    ];

    /// Stable identifier, also used as the key in `User::subscriptions`.
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceId::PremiumSignals => "premium_signals",
            ServiceId::ElitePremium => "elite_premium",
            ServiceId::PremiumEa => "premium_ea",
            ServiceId::Mentorship => "mentorship",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ServiceId::PremiumSignals => "Premium Signals",
            ServiceId::ElitePremium => "Elite Premium",
            ServiceId::PremiumEa => "Premium EA",
            ServiceId::Mentorship => "Mentorship",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown service: {0}")]
pub struct UnknownService(pub String);

impl FromStr for ServiceId {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceId::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| UnknownService(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip_through_str() {
        for service in ServiceId::ALL {
            assert_eq!(service.as_str().parse::<ServiceId>().unwrap(), service);
        }
        assert!("gold_plan".parse::<ServiceId>().is_err());
    }

    #[test]
    fn test_serde_uses_stable_ids() {
        let json = serde_json::to_string(&ServiceId::PremiumEa).unwrap();
        assert_eq!(json, "\"premium_ea\"");
    }
}
