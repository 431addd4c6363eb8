//! Per-domain registry of loaded estimators and their encoders.
//!
//! Loading happens once at startup, one domain at a time; afterwards the
//! registry is only read and can be shared behind an `Arc` without locks.

use super::encoder::Encoder;
use super::inference::Estimator;
use super::loader::ModelLoader;
use crate::features;
use crate::types::Domain;
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Model {0} not loaded")]
    NotLoaded(Domain),

    #[error("Estimator for {domain} failed: {source}")]
    Estimator {
        domain: Domain,
        #[source]
        source: anyhow::Error,
    },
}

/// A successfully loaded domain
pub struct ModelEntry {
    pub estimator: Arc<dyn Estimator>,
    pub encoder: Option<Encoder>,
}

pub struct ModelRegistry {
    loader: ModelLoader,
    entries: HashMap<Domain, ModelEntry>,
    /// Every domain with a load attempt, true when it succeeded
    status: BTreeMap<Domain, bool>,
}

impl ModelRegistry {
    pub fn new(loader: ModelLoader) -> Self {
        Self {
            loader,
            entries: HashMap::new(),
            status: BTreeMap::new(),
        }
    }

    /// Load an ONNX model and optional encoder for `domain`.
    ///
    /// Returns false (domain unloaded) if the model cannot be loaded. An
    /// encoder that is missing or unreadable only logs a warning.
    pub fn load(
        &mut self,
        domain: Domain,
        model_path: &Path,
        encoder_path: Option<&Path>,
        expected_features: Option<usize>,
    ) -> bool {
        let loader = self.loader.clone();
        self.load_with(
            domain,
            || {
                let estimator = loader.load_model(model_path, domain.as_str(), expected_features)?;
                Ok(Arc::new(estimator) as Arc<dyn Estimator>)
            },
            encoder_path,
        )
    }

    /// Load `domain` with a caller-supplied model constructor
    pub fn load_with<F>(&mut self, domain: Domain, load_model: F, encoder_path: Option<&Path>) -> bool
    where
        F: FnOnce() -> Result<Arc<dyn Estimator>>,
    {
        let estimator = match load_model() {
            Ok(estimator) => estimator,
            Err(e) => {
                error!(domain = %domain, error = %format!("{:#}", e), "Failed to load model");
                self.entries.remove(&domain);
                self.status.insert(domain, false);
                return false;
            }
        };

        let encoder = encoder_path.and_then(|path| Self::load_encoder(domain, path));
        self.insert(domain, estimator, encoder);
        true
    }

    fn load_encoder(domain: Domain, path: &Path) -> Option<Encoder> {
        if !path.exists() {
            warn!(domain = %domain, path = %path.display(), "Label encoder not found");
            return None;
        }

        match Encoder::load(path) {
            Ok(encoder) => {
                info!(domain = %domain, path = %path.display(), kind = encoder.kind(), classes = encoder.class_count(), "Label encoder loaded");
                Some(encoder)
            }
            Err(e) => {
                warn!(domain = %domain, error = %format!("{:#}", e), "Failed to load label encoder, continuing without it");
                None
            }
        }
    }

    /// Register an already constructed estimator, replacing any previous entry
    pub fn insert(&mut self, domain: Domain, estimator: Arc<dyn Estimator>, encoder: Option<Encoder>) {
        info!(
            domain = %domain,
            expected_features = estimator.expected_width(),
            encoder = encoder.as_ref().map(Encoder::kind).unwrap_or("none"),
            "Domain loaded"
        );
        let pipeline_width = features::feature_names(domain).len();
        if estimator.expected_width() != pipeline_width {
            warn!(
                domain = %domain,
                model_width = estimator.expected_width(),
                pipeline_width,
                "Model input width differs from pipeline feature count"
            );
        }
        self.entries.insert(domain, ModelEntry { estimator, encoder });
        self.status.insert(domain, true);
    }

    pub fn get(&self, domain: Domain) -> Result<&Arc<dyn Estimator>, RegistryError> {
        self.entries
            .get(&domain)
            .map(|entry| &entry.estimator)
            .ok_or(RegistryError::NotLoaded(domain))
    }

    pub fn get_encoder(&self, domain: Domain) -> Option<&Encoder> {
        self.entries.get(&domain).and_then(|entry| entry.encoder.as_ref())
    }

    pub fn is_loaded(&self, domain: Domain) -> bool {
        self.entries.contains_key(&domain)
    }

    pub fn any_loaded(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Load outcome per attempted domain
    pub fn status(&self) -> BTreeMap<Domain, bool> {
        self.status.clone()
    }

    /// Encoder availability per attempted domain
    pub fn encoder_status(&self) -> BTreeMap<Domain, bool> {
        self.status
            .keys()
            .map(|domain| (*domain, self.get_encoder(*domain).is_some()))
            .collect()
    }

    pub fn predict(&self, domain: Domain, rows: &[&[f64]]) -> Result<Vec<bool>, RegistryError> {
        self.get(domain)?
            .predict(rows)
            .map_err(|source| RegistryError::Estimator { domain, source })
    }

    pub fn predict_proba(
        &self,
        domain: Domain,
        rows: &[&[f64]],
    ) -> Result<Option<Vec<Vec<f64>>>, RegistryError> {
        self.get(domain)?
            .predict_proba(rows)
            .map_err(|source| RegistryError::Estimator { domain, source })
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(ModelLoader::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantEstimator {
        width: usize,
    }

    impl Estimator for ConstantEstimator {
        fn expected_width(&self) -> usize {
            self.width
        }

        fn predict(&self, rows: &[&[f64]]) -> Result<Vec<bool>> {
            Ok(vec![true; rows.len()])
        }

        fn predict_proba(&self, rows: &[&[f64]]) -> Result<Option<Vec<Vec<f64>>>> {
            Ok(Some(vec![vec![0.1, 0.9]; rows.len()]))
        }
    }

    fn constant(width: usize) -> Result<Arc<dyn Estimator>> {
        Ok(Arc::new(ConstantEstimator { width }))
    }

    #[test]
    fn test_missing_model_marks_domain_unloaded() {
        let mut registry = ModelRegistry::default();
        let loaded = registry.load(
            Domain::CreditCard,
            Path::new("does/not/exist.onnx"),
            None,
            Some(11),
        );

        assert!(!loaded);
        assert!(!registry.is_loaded(Domain::CreditCard));
        assert_eq!(registry.status().get(&Domain::CreditCard), Some(&false));
        assert!(matches!(
            registry.get(Domain::CreditCard),
            Err(RegistryError::NotLoaded(Domain::CreditCard))
        ));
    }

    #[test]
    fn test_domains_load_independently() {
        let mut registry = ModelRegistry::default();
        assert!(!registry.load_with(Domain::OnlinePayment, || anyhow::bail!("corrupt artifact"), None));
        assert!(registry.load_with(Domain::CreditCard, || constant(11), None));

        let status = registry.status();
        assert_eq!(status[&Domain::OnlinePayment], false);
        assert_eq!(status[&Domain::CreditCard], true);
        assert!(registry.any_loaded());
    }

    #[test]
    fn test_encoder_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("encoder.json");
        std::fs::write(&broken, "{ not json").unwrap();

        let mut registry = ModelRegistry::default();
        assert!(registry.load_with(Domain::OnlinePayment, || constant(5), Some(&broken)));
        assert!(registry.is_loaded(Domain::OnlinePayment));
        assert!(registry.get_encoder(Domain::OnlinePayment).is_none());

        let missing = dir.path().join("missing.json");
        assert!(registry.load_with(Domain::CreditCard, || constant(11), Some(&missing)));
        assert_eq!(registry.encoder_status()[&Domain::CreditCard], false);
    }

    #[test]
    fn test_encoder_loaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encoder.json");
        std::fs::write(&path, r#"["CASH_IN", "CASH_OUT", "DEBIT", "PAYMENT", "TRANSFER"]"#).unwrap();

        let mut registry = ModelRegistry::default();
        assert!(registry.load_with(Domain::OnlinePayment, || constant(5), Some(&path)));

        assert_eq!(registry.get_encoder(Domain::OnlinePayment).map(Encoder::kind), Some("fitted"));
        assert_eq!(registry.encoder_status()[&Domain::OnlinePayment], true);
    }

    #[test]
    fn test_failed_reload_removes_entry() {
        let mut registry = ModelRegistry::default();
        assert!(registry.load_with(Domain::OnlinePayment, || constant(5), None));
        assert!(!registry.load_with(Domain::OnlinePayment, || anyhow::bail!("gone"), None));

        assert!(!registry.is_loaded(Domain::OnlinePayment));
        assert!(!registry.any_loaded());
    }

    #[test]
    fn test_predict_dispatch() {
        let mut registry = ModelRegistry::default();
        registry.insert(Domain::CreditCard, Arc::new(ConstantEstimator { width: 11 }), None);

        let row = [0.0; 11];
        assert_eq!(registry.predict(Domain::CreditCard, &[&row]).unwrap(), vec![true]);
        assert_eq!(
            registry.predict_proba(Domain::CreditCard, &[&row]).unwrap(),
            Some(vec![vec![0.1, 0.9]])
        );
        assert!(matches!(
            registry.predict(Domain::OnlinePayment, &[&row]),
            Err(RegistryError::NotLoaded(Domain::OnlinePayment))
        ));
    }
}
