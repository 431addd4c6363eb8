//! Transaction domains and the raw records submitted for scoring

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw, human-readable transaction record as received from a caller.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Transaction domain selecting the pipeline/model pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "online-payment")]
    OnlinePayment,
    #[serde(rename = "credit-card")]
    CreditCard,
}

impl Domain {
    /// Every supported domain, in load order.
    pub const ALL: [Domain; 2] = [Domain::OnlinePayment, Domain::CreditCard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::OnlinePayment => "online-payment",
            Domain::CreditCard => "credit-card",
        }
    }

    /// Field carrying the transaction amount for this domain
    pub fn amount_field(&self) -> &'static str {
        match self {
            Domain::OnlinePayment => "amount",
            Domain::CreditCard => "amt",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a domain identifier does not name a supported domain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown domain: {0}")]
pub struct UnknownDomain(pub String);

impl FromStr for Domain {
    type Err = UnknownDomain;

    /// Exact match only: `Credit-Card` or `credit` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownDomain(s.to_string()))
    }
}
