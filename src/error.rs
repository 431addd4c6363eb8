//! Request-level error taxonomy surfaced to callers

use crate::types::Domain;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    /// No domain was loaded at startup
    #[error("Fraud detection service not available")]
    ServiceUnavailable,

    #[error("{0} model not loaded")]
    ModelNotLoaded(Domain),

    #[error("Invalid {domain} data: {details}")]
    InvalidInput { domain: Domain, details: String },

    /// Pipeline and deployed model disagree on the input width
    #[error("Feature count mismatch for {domain}: generated {generated}, model expects {expected}")]
    FeatureMismatch {
        domain: Domain,
        generated: usize,
        expected: usize,
    },

    #[error("{domain} prediction failed: {message}")]
    PredictionFailed { domain: Domain, message: String },
}

impl PredictError {
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::ServiceUnavailable => "service_unavailable",
            PredictError::ModelNotLoaded(_) => "model_not_loaded",
            PredictError::InvalidInput { .. } => "invalid_input",
            PredictError::FeatureMismatch { .. } => "feature_mismatch",
            PredictError::PredictionFailed { .. } => "prediction_failed",
        }
    }

    /// HTTP-equivalent status for transport adapters
    pub fn status_code(&self) -> u16 {
        match self {
            PredictError::InvalidInput { .. } => 400,
            PredictError::ServiceUnavailable | PredictError::ModelNotLoaded(_) => 503,
            PredictError::FeatureMismatch { .. } | PredictError::PredictionFailed { .. } => 500,
        }
    }
}
