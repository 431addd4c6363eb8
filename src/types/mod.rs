//! Type definitions for the fraud risk service

pub mod domain;
pub mod prediction;

pub use domain::{Domain, RawRecord, UnknownDomain};
pub use prediction::{ConfidenceLevel, PredictionResult, RiskThresholds, RiskTier};
