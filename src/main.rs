//! Fraud Risk Service - Main Entry Point
//!
//! Loads one classifier per domain, answers prediction requests over NATS
//! request/reply and reports health and model status.

use anyhow::{Context, Result};
use fraud_risk_service::{
    config::{AppConfig, LoggingConfig},
    consumer::{handle, unrouted, RequestConsumer, Route},
    metrics::{MetricsReporter, PipelineMetrics},
    models::{ModelLoader, ModelRegistry},
    producer::ReplyProducer,
    Domain, FraudService,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("fraud_risk_service={}", logging.level))
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
    Ok(())
}

fn load_registry(config: &AppConfig) -> ModelRegistry {
    let mut registry = ModelRegistry::new(ModelLoader::with_threads(config.models.onnx_threads));

    for domain in Domain::ALL {
        let paths = config.models.for_domain(domain);
        registry.load(
            domain,
            &paths.model_path,
            paths.encoder_path.as_deref(),
            paths.expected_features,
        );
    }

    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Fraud Risk Service");
    info!(
        low = config.risk.low,
        high = config.risk.high,
        "Risk tier thresholds"
    );

    let registry = load_registry(&config);
    for (domain, loaded) in registry.status() {
        info!(domain = %domain, loaded, "Model status");
    }
    if !registry.any_loaded() {
        error!("No models loaded, prediction requests will be rejected");
    }

    let metrics = Arc::new(PipelineMetrics::new());
    let service = Arc::new(
        FraudService::new(Arc::new(registry))
            .with_thresholds(config.risk.clone())
            .with_metrics(metrics.clone()),
    );

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats.subject_prefix);
    let producer = ReplyProducer::new(client.clone());
    let prefix: Arc<str> = Arc::from(consumer.prefix());

    let num_workers = config.pipeline.workers.max(1);
    info!(workers = num_workers, "Starting request loop");
    let semaphore = Arc::new(Semaphore::new(num_workers));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let Some(inbox) = message.reply.clone() else {
            warn!(subject = %message.subject, "Request has no reply subject, dropping");
            continue;
        };
        let Some(route) = Route::parse(&prefix, &message.subject) else {
            debug!(subject = %message.subject, "Rejecting unrouted subject");
            if let Err(e) = producer.reply(inbox, &unrouted(&prefix, &message.subject)).await {
                error!(error = %e, "Failed to publish reply");
            }
            continue;
        };

        let permit = semaphore.clone().acquire_owned().await?;

        let service = service.clone();
        let producer = producer.clone();
        let prefix = prefix.clone();

        tokio::spawn(async move {
            let payload = message.payload;
            let body = tokio::task::spawn_blocking(move || {
                handle(&service, &prefix, &route, &payload)
            })
            .await;

            match body {
                Ok(body) => {
                    if let Err(e) = producer.reply(inbox, &body).await {
                        error!(error = %e, "Failed to publish reply");
                    }
                }
                Err(e) => error!(error = %e, "Request task failed"),
            }

            drop(permit);
        });
    }

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
