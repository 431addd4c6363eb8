//! NATS request consumer and subject routing

use crate::producer::{error_body, ErrorReply};
use crate::service::FraudService;
use crate::types::{Domain, RawRecord, UnknownDomain};
use anyhow::Result;
use async_nats::{Client, Subscriber};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

/// Operation addressed by a request subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Predict(Domain),
    /// `<prefix>.predict` without a domain
    PredictLegacy,
    Health,
    ModelsStatus,
}

impl Route {
    /// Resolve a subject under `prefix`; domains must match exactly
    pub fn parse(prefix: &str, subject: &str) -> Option<Route> {
        let rest = subject.strip_prefix(prefix)?.strip_prefix('.')?;
        match rest {
            "predict" => Some(Route::PredictLegacy),
            "health" => Some(Route::Health),
            "models.status" => Some(Route::ModelsStatus),
            _ => rest
                .strip_prefix("predict.")
                .and_then(|domain| domain.parse().ok())
                .map(Route::Predict),
        }
    }
}

pub fn predict_subject(prefix: &str, domain: Domain) -> String {
    format!("{}.predict.{}", prefix, domain)
}

#[derive(Serialize)]
struct StatusReply {
    models_loaded: BTreeMap<Domain, bool>,
    encoders_available: BTreeMap<Domain, bool>,
    available_subjects: BTreeMap<Domain, Option<String>>,
}

/// Produce the JSON reply for one request
pub fn handle(service: &FraudService, prefix: &str, route: &Route, payload: &[u8]) -> Value {
    match route {
        Route::Health => serde_json::to_value(service.health_status()).unwrap_or(Value::Null),
        Route::ModelsStatus => {
            let status = service.models_status();
            let available_subjects = status
                .models_loaded
                .iter()
                .map(|(domain, loaded)| (*domain, loaded.then(|| predict_subject(prefix, *domain))))
                .collect();
            serde_json::to_value(StatusReply {
                models_loaded: status.models_loaded,
                encoders_available: status.encoders_available,
                available_subjects,
            })
            .unwrap_or(Value::Null)
        }
        Route::Predict(domain) => predict(service, Some(*domain), payload),
        Route::PredictLegacy => predict(service, None, payload),
    }
}

/// Error reply for a subject under the prefix that names no operation
pub fn unrouted(prefix: &str, subject: &str) -> Value {
    let predict_prefix = format!("{}.predict.", prefix);
    let message = match subject.strip_prefix(predict_prefix.as_str()) {
        Some(domain) => UnknownDomain(domain.to_string()).to_string(),
        None => format!("unknown subject: {}", subject),
    };
    serde_json::to_value(ErrorReply {
        error: error_body("invalid_input", message, 400),
    })
    .unwrap_or(Value::Null)
}

fn predict(service: &FraudService, domain: Option<Domain>, payload: &[u8]) -> Value {
    let record: RawRecord = match serde_json::from_slice(payload) {
        Ok(record) => record,
        Err(e) => {
            return serde_json::to_value(ErrorReply {
                error: error_body("invalid_input", format!("Malformed request body: {}", e), 400),
            })
            .unwrap_or(Value::Null)
        }
    };

    let outcome = match domain {
        Some(domain) => service.predict(domain, &record),
        None => service.predict_legacy(&record),
    };

    match outcome {
        Ok(result) => serde_json::to_value(result).unwrap_or(Value::Null),
        Err(e) => serde_json::to_value(ErrorReply::from(&e)).unwrap_or(Value::Null),
    }
}

/// Consumer for prediction requests from NATS
pub struct RequestConsumer {
    client: Client,
    prefix: String,
}

impl RequestConsumer {
    pub fn new(client: Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
        }
    }

    /// Subscribe to every subject under the prefix
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subject = format!("{}.>", self.prefix);
        let subscriber = self.client.subscribe(subject.clone()).await?;
        info!(subject = %subject, "Subscribed to request subjects");
        Ok(subscriber)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Estimator, ModelRegistry};
    use serde_json::json;
    use std::sync::Arc;

    struct ThresholdEstimator;

    impl Estimator for ThresholdEstimator {
        fn expected_width(&self) -> usize {
            5
        }

        fn predict(&self, rows: &[&[f64]]) -> anyhow::Result<Vec<bool>> {
            Ok(rows.iter().map(|row| row[1] > 5000.0).collect())
        }

        fn predict_proba(&self, rows: &[&[f64]]) -> anyhow::Result<Option<Vec<Vec<f64>>>> {
            Ok(Some(
                rows.iter()
                    .map(|row| if row[1] > 5000.0 { vec![0.1, 0.9] } else { vec![0.8, 0.2] })
                    .collect(),
            ))
        }
    }

    fn online_payment_service() -> FraudService {
        let mut registry = ModelRegistry::default();
        registry.insert(Domain::OnlinePayment, Arc::new(ThresholdEstimator), None);
        registry.load_with(Domain::CreditCard, || anyhow::bail!("artifact missing"), None);
        FraudService::new(Arc::new(registry))
    }

    fn payment_body(amount: f64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "step": 1,
            "type": "TRANSFER",
            "amount": amount,
            "oldbalanceOrg": 20000.0,
            "newbalanceOrig": 20000.0 - amount,
            "oldbalanceDest": 0.0,
            "newbalanceDest": amount
        }))
        .unwrap()
    }

    #[test]
    fn test_route_parsing() {
        assert_eq!(
            Route::parse("fraud", "fraud.predict.credit-card"),
            Some(Route::Predict(Domain::CreditCard))
        );
        assert_eq!(Route::parse("fraud", "fraud.predict"), Some(Route::PredictLegacy));
        assert_eq!(Route::parse("fraud", "fraud.health"), Some(Route::Health));
        assert_eq!(Route::parse("fraud", "fraud.models.status"), Some(Route::ModelsStatus));
        assert_eq!(Route::parse("fraud", "fraud.predict.Credit-Card"), None);
        assert_eq!(Route::parse("fraud", "fraudx.health"), None);
        assert_eq!(Route::parse("fraud", "other.health"), None);
    }

    #[test]
    fn test_handle_without_models() {
        let service = FraudService::new(Arc::new(ModelRegistry::default()));

        let health = handle(&service, "fraud", &Route::Health, b"");
        assert_eq!(health["status"], "unhealthy");

        let reply = handle(&service, "fraud", &Route::Predict(Domain::OnlinePayment), b"{}");
        assert_eq!(reply["error"]["kind"], "service_unavailable");
        assert_eq!(reply["error"]["status"], 503);

        let reply = handle(&service, "fraud", &Route::PredictLegacy, b"not json");
        assert_eq!(reply["error"]["kind"], "invalid_input");
    }

    #[test]
    fn test_predict_reply() {
        let service = online_payment_service();

        let reply = handle(
            &service,
            "fraud",
            &Route::parse("fraud", "fraud.predict.online-payment").unwrap(),
            &payment_body(9000.0),
        );

        assert_eq!(reply["model_type"], "online-payment");
        assert_eq!(reply["is_fraud"], true);
        assert_eq!(reply["fraud_probability"], 0.9);
        assert_eq!(reply["risk_score"], "HIGH");
        assert_eq!(reply["confidence_level"], "high");
        assert_eq!(reply["transaction_amount"], 9000.0);
        assert_eq!(reply["features_used"]["type_encoded"], 1.0);
        assert!(reply.get("error").is_none());
    }

    #[test]
    fn test_legacy_subject_scores_online_payment() {
        let service = online_payment_service();

        let reply = handle(
            &service,
            "fraud",
            &Route::parse("fraud", "fraud.predict").unwrap(),
            &payment_body(100.0),
        );

        assert_eq!(reply["model_type"], "online-payment");
        assert_eq!(reply["is_fraud"], false);
        assert_eq!(reply["risk_score"], "LOW");
    }

    #[test]
    fn test_unloaded_domain_reply() {
        let service = online_payment_service();

        let reply = handle(&service, "fraud", &Route::Predict(Domain::CreditCard), b"{}");
        assert_eq!(reply["error"]["kind"], "model_not_loaded");
        assert_eq!(reply["error"]["status"], 503);
    }

    #[test]
    fn test_models_status_lists_available_subjects() {
        let service = online_payment_service();

        let reply = handle(&service, "fraud", &Route::ModelsStatus, b"");

        assert_eq!(reply["models_loaded"]["online-payment"], true);
        assert_eq!(reply["models_loaded"]["credit-card"], false);
        assert_eq!(reply["encoders_available"]["online-payment"], false);
        assert_eq!(
            reply["available_subjects"]["online-payment"],
            "fraud.predict.online-payment"
        );
        assert!(reply["available_subjects"]["credit-card"].is_null());
    }

    #[test]
    fn test_unrouted_subject_reply() {
        let reply = unrouted("fraud", "fraud.predict.Credit-Card");
        assert_eq!(reply["error"]["kind"], "invalid_input");
        assert_eq!(reply["error"]["status"], 400);
        assert_eq!(reply["error"]["message"], "unknown domain: Credit-Card");

        let reply = unrouted("fraud", "fraud.metrics");
        assert_eq!(reply["error"]["message"], "unknown subject: fraud.metrics");
    }
}
