//! Prediction result data structures

use super::domain::Domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coarse risk verdict derived from fraud probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Determine risk tier from probability and thresholds
    pub fn from_probability(probability: f64, thresholds: &RiskThresholds) -> Self {
        if probability > thresholds.high {
            RiskTier::High
        } else if probability > thresholds.low {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }
}

/// Confidence reported alongside the risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Medium,
    High,
}

/// Configurable risk tier boundaries (exclusive lower bounds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// At or below this the verdict is LOW
    pub low: f64,
    /// Above this the verdict is HIGH
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 0.4,
            high: 0.8,
        }
    }
}

/// Normalized verdict for a single scored transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Unique prediction identifier
    pub prediction_id: String,

    /// Domain whose model produced the verdict
    pub model_type: Domain,

    /// Boolean fraud flag from the estimator
    pub is_fraud: bool,

    /// Fraud class probability (0.0 - 1.0)
    pub fraud_probability: f64,

    pub confidence_level: ConfidenceLevel,

    /// Risk tier (LOW / MEDIUM / HIGH)
    pub risk_score: RiskTier,

    pub transaction_amount: f64,

    /// Realized feature vector keyed by feature name
    pub features_used: BTreeMap<String, f64>,

    /// Categorical fields that were encoded with a fallback value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_fields: Vec<String>,

    pub timestamp: DateTime<Utc>,
}
