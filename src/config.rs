//! Configuration management for the fraud risk service

use crate::types::{Domain, RiskThresholds};
use anyhow::{bail, Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the configuration file path
pub const CONFIG_PATH_ENV: &str = "FRAUD_CONFIG_PATH";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub risk: RiskThresholds,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Prefix of every request subject (`<prefix>.predict.<domain>`)
    pub subject_prefix: String,
}

/// Artifact locations for one domain
#[derive(Debug, Clone, Deserialize)]
pub struct DomainModelConfig {
    /// ONNX classifier
    pub model_path: PathBuf,
    /// JSON encoder artifact; absent means built-in or hash fallback encoding
    #[serde(default)]
    pub encoder_path: Option<PathBuf>,
    /// Feature count to assume when the model input dimension is symbolic
    #[serde(default)]
    pub expected_features: Option<usize>,
}

/// ML models configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub online_payment: DomainModelConfig,
    pub credit_card: DomainModelConfig,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

impl ModelsConfig {
    pub fn for_domain(&self, domain: Domain) -> &DomainModelConfig {
        match domain {
            Domain::OnlinePayment => &self.online_payment,
            Domain::CreditCard => &self.credit_card,
        }
    }
}

/// Request handling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum requests scored concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `FRAUD_CONFIG_PATH` or `config/config.toml`
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/config.toml"));
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        validate_thresholds(&config.risk)?;
        Ok(config)
    }
}

/// Tier boundaries must satisfy `0 <= low <= high <= 1`
fn validate_thresholds(risk: &RiskThresholds) -> Result<()> {
    if !(0.0 <= risk.low && risk.low <= risk.high && risk.high <= 1.0) {
        bail!(
            "Invalid [risk] thresholds: low = {}, high = {} (expected 0 <= low <= high <= 1)",
            risk.low,
            risk.high
        );
    }
    Ok(())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                subject_prefix: "fraud".to_string(),
            },
            models: ModelsConfig {
                online_payment: DomainModelConfig {
                    model_path: PathBuf::from("models/online_payment.onnx"),
                    encoder_path: Some(PathBuf::from("models/online_payment_label_encoder.json")),
                    expected_features: None,
                },
                credit_card: DomainModelConfig {
                    model_path: PathBuf::from("models/credit_card.onnx"),
                    encoder_path: Some(PathBuf::from("models/credit_card_label_encoders.json")),
                    expected_features: Some(11),
                },
                onnx_threads: 1,
            },
            risk: RiskThresholds::default(),
            pipeline: PipelineConfig {
                workers: 8,
                metrics_interval_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}
