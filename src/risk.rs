//! Maps fraud probability to a (confidence, tier) verdict.
//!
//! The lowest-risk bucket reports `high` confidence while both middle bands
//! report `medium`. This mirrors the production policy and is kept as-is until
//! product confirms the intended naming.

use crate::types::prediction::{ConfidenceLevel, RiskThresholds, RiskTier};

/// Classify with the default 0.4 / 0.8 boundaries.
pub fn classify(probability: f64) -> (ConfidenceLevel, RiskTier) {
    classify_with(probability, &RiskThresholds::default())
}

/// Classify with explicit boundaries. Total over all inputs, including NaN
/// (which lands in the LOW bucket since every comparison is false).
pub fn classify_with(probability: f64, thresholds: &RiskThresholds) -> (ConfidenceLevel, RiskTier) {
    let tier = RiskTier::from_probability(probability, thresholds);
    let confidence = match tier {
        RiskTier::High | RiskTier::Low => ConfidenceLevel::High,
        RiskTier::Medium => ConfidenceLevel::Medium,
    };
    (confidence, tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(1.0), (ConfidenceLevel::High, RiskTier::High));
        assert_eq!(classify(0.81), (ConfidenceLevel::High, RiskTier::High));
        assert_eq!(classify(0.8), (ConfidenceLevel::Medium, RiskTier::Medium));
        assert_eq!(classify(0.6), (ConfidenceLevel::Medium, RiskTier::Medium));
        assert_eq!(classify(0.41), (ConfidenceLevel::Medium, RiskTier::Medium));
        assert_eq!(classify(0.4), (ConfidenceLevel::High, RiskTier::Low));
        assert_eq!(classify(0.0), (ConfidenceLevel::High, RiskTier::Low));
    }

    #[test]
    fn test_classify_nan_is_low() {
        assert_eq!(classify(f64::NAN), (ConfidenceLevel::High, RiskTier::Low));
    }

    #[test]
    fn test_classify_with_custom_thresholds() {
        let thresholds = RiskThresholds { low: 0.2, high: 0.5 };
        assert_eq!(classify_with(0.3, &thresholds).1, RiskTier::Medium);
        assert_eq!(classify_with(0.6, &thresholds).1, RiskTier::High);
    }
}
