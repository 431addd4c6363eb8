//! Inference dispatch: validate, build features, check width, predict, score.
//!
//! `FraudService` is stateless across requests. It reads the shared registry
//! and returns a normalized verdict or a typed error for each record.

use crate::error::PredictError;
use crate::features::{self, FeatureVector};
use crate::metrics::PipelineMetrics;
use crate::models::registry::{ModelRegistry, RegistryError};
use crate::risk;
use crate::types::{Domain, PredictionResult, RawRecord, RiskThresholds};
use crate::validation;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Service health snapshot
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// "healthy" when at least one domain is loaded
    pub status: &'static str,
    pub models_loaded: BTreeMap<Domain, bool>,
    pub message: &'static str,
}

/// Model and encoder availability per domain
#[derive(Debug, Clone, Serialize)]
pub struct ModelsStatus {
    pub models_loaded: BTreeMap<Domain, bool>,
    pub encoders_available: BTreeMap<Domain, bool>,
}

pub struct FraudService {
    registry: Arc<ModelRegistry>,
    thresholds: RiskThresholds,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl FraudService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            thresholds: RiskThresholds::default(),
            metrics: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Score one record against the `domain` model
    pub fn predict(&self, domain: Domain, record: &RawRecord) -> Result<PredictionResult, PredictError> {
        let start = Instant::now();
        let outcome = self.dispatch(domain, record);

        if let Some(metrics) = &self.metrics {
            match &outcome {
                Ok(result) => metrics.record_prediction(result, start.elapsed()),
                Err(e) => metrics.record_failure(e.kind(), start.elapsed()),
            }
        }

        outcome
    }

    /// Records submitted without a domain are online payments
    pub fn predict_legacy(&self, record: &RawRecord) -> Result<PredictionResult, PredictError> {
        self.predict(Domain::OnlinePayment, record)
    }

    pub fn health_status(&self) -> HealthStatus {
        let healthy = self.registry.any_loaded();
        HealthStatus {
            status: if healthy { "healthy" } else { "unhealthy" },
            models_loaded: self.registry.status(),
            message: if healthy {
                "Service is healthy"
            } else {
                "No models loaded"
            },
        }
    }

    pub fn models_status(&self) -> ModelsStatus {
        ModelsStatus {
            models_loaded: self.registry.status(),
            encoders_available: self.registry.encoder_status(),
        }
    }

    fn dispatch(&self, domain: Domain, record: &RawRecord) -> Result<PredictionResult, PredictError> {
        if !self.registry.any_loaded() {
            return Err(PredictError::ServiceUnavailable);
        }
        if !self.registry.is_loaded(domain) {
            return Err(PredictError::ModelNotLoaded(domain));
        }

        let violations = validation::validation_errors(domain, record);
        if !violations.is_empty() {
            debug!(domain = %domain, violations = ?violations, "Rejected invalid record");
            return Err(PredictError::InvalidInput {
                domain,
                details: violations.join("; "),
            });
        }

        // Estimators may sit on native runtimes; keep their panics inside this request
        match panic::catch_unwind(AssertUnwindSafe(|| self.score(domain, record))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "estimator panicked".to_string());
                error!(domain = %domain, error = %message, "Prediction panicked");
                Err(PredictError::PredictionFailed { domain, message })
            }
        }
    }

    fn score(&self, domain: Domain, record: &RawRecord) -> Result<PredictionResult, PredictError> {
        let encoder = self.registry.get_encoder(domain);
        let vector = features::build(domain, record, encoder);
        self.score_vector(domain, record, vector)
    }

    fn score_vector(
        &self,
        domain: Domain,
        record: &RawRecord,
        vector: FeatureVector,
    ) -> Result<PredictionResult, PredictError> {
        if !vector.fallbacks().is_empty() {
            if let Some(metrics) = &self.metrics {
                metrics.record_fallbacks(domain, vector.fallbacks());
            }
        }

        let expected = self.registry.get(domain).map_err(map_registry_error)?.expected_width();
        if vector.len() != expected {
            error!(
                domain = %domain,
                generated = vector.len(),
                expected,
                "Feature count mismatch between pipeline and deployed model"
            );
            return Err(PredictError::FeatureMismatch {
                domain,
                generated: vector.len(),
                expected,
            });
        }

        let rows = [vector.values()];

        let is_fraud = self
            .registry
            .predict(domain, &rows)
            .map_err(map_registry_error)?
            .first()
            .copied()
            .ok_or_else(|| PredictError::PredictionFailed {
                domain,
                message: "estimator returned no prediction".to_string(),
            })?;

        let fraud_probability = match self
            .registry
            .predict_proba(domain, &rows)
            .map_err(map_registry_error)?
        {
            Some(probabilities) => fraud_class_probability(domain, &probabilities)?,
            None => {
                debug!(domain = %domain, "Estimator exposes no probabilities, using 0.0");
                0.0
            }
        };

        let (confidence_level, risk_score) = risk::classify_with(fraud_probability, &self.thresholds);

        debug!(
            domain = %domain,
            is_fraud,
            fraud_probability,
            risk = risk_score.as_str(),
            "Prediction complete"
        );

        Ok(PredictionResult {
            prediction_id: uuid::Uuid::new_v4().to_string(),
            model_type: domain,
            is_fraud,
            fraud_probability,
            confidence_level,
            risk_score,
            transaction_amount: features::numeric(record, domain.amount_field()),
            features_used: vector.named(),
            fallback_fields: vector.fallbacks().iter().map(|f| f.field.to_string()).collect(),
            timestamp: Utc::now(),
        })
    }
}

/// Column 1 of the first row is the fraud class
fn fraud_class_probability(domain: Domain, probabilities: &[Vec<f64>]) -> Result<f64, PredictError> {
    probabilities
        .first()
        .and_then(|row| row.get(1))
        .copied()
        .ok_or_else(|| PredictError::PredictionFailed {
            domain,
            message: "probability output has no fraud class column".to_string(),
        })
}

fn map_registry_error(err: RegistryError) -> PredictError {
    match err {
        RegistryError::NotLoaded(domain) => PredictError::ModelNotLoaded(domain),
        RegistryError::Estimator { domain, source } => {
            error!(domain = %domain, error = %format!("{:#}", source), "Estimator failed");
            PredictError::PredictionFailed {
                domain,
                message: format!("{:#}", source),
            }
        }
    }
}
