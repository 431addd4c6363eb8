//! Fraud Risk Service Library
//!
//! Multi-model fraud risk inference for online-payment and credit-card
//! transactions, served as NATS request/reply.

pub mod config;
pub mod consumer;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod risk;
pub mod service;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use consumer::{RequestConsumer, Route};
pub use error::PredictError;
pub use models::{Encoder, Estimator, ModelRegistry};
pub use producer::ReplyProducer;
pub use service::FraudService;
pub use types::{Domain, PredictionResult, RawRecord, RiskTier};
