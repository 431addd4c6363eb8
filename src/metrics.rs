//! Runtime metrics for the inference service.

use crate::features::{FallbackReason, FieldFallback};
use crate::types::{Domain, PredictionResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Metrics collector for prediction traffic
pub struct PipelineMetrics {
    /// Total prediction requests
    pub requests: AtomicU64,
    /// Requests that produced a verdict
    pub predictions: AtomicU64,
    /// Requests that ended in an error
    pub failures: AtomicU64,
    /// Requests whose categorical features were hash-encoded
    pub hash_fallback_requests: AtomicU64,
    predictions_by_domain: RwLock<HashMap<String, u64>>,
    failures_by_kind: RwLock<HashMap<String, u64>>,
    verdicts_by_tier: RwLock<HashMap<String, u64>>,
    /// Fallback encodings keyed by `domain.field:reason`
    fallbacks_by_field: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Fraud probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            hash_fallback_requests: AtomicU64::new(0),
            predictions_by_domain: RwLock::new(HashMap::new()),
            failures_by_kind: RwLock::new(HashMap::new()),
            verdicts_by_tier: RwLock::new(HashMap::new()),
            fallbacks_by_field: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    fn bump(map: &RwLock<HashMap<String, u64>>, key: String) {
        if let Ok(mut map) = map.write() {
            *map.entry(key).or_insert(0) += 1;
        }
    }

    fn record_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, result: &PredictionResult, processing_time: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.predictions.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);

        Self::bump(&self.predictions_by_domain, result.model_type.to_string());
        Self::bump(&self.verdicts_by_tier, result.risk_score.as_str().to_string());

        let bucket = (result.fraud_probability.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a failed prediction by error kind
    pub fn record_failure(&self, kind: &str, processing_time: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);
        Self::bump(&self.failures_by_kind, kind.to_string());
    }

    /// Record fallback encodings used for one request
    pub fn record_fallbacks(&self, domain: Domain, fallbacks: &[FieldFallback]) {
        if fallbacks.iter().any(|f| f.reason == FallbackReason::Hashed) {
            self.hash_fallback_requests.fetch_add(1, Ordering::Relaxed);
        }
        for fallback in fallbacks {
            Self::bump(
                &self.fallbacks_by_field,
                format!("{}.{}:{}", domain, fallback.field, fallback.reason.as_str()),
            );
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    fn snapshot(map: &RwLock<HashMap<String, u64>>) -> HashMap<String, u64> {
        map.read().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn get_predictions_by_domain(&self) -> HashMap<String, u64> {
        Self::snapshot(&self.predictions_by_domain)
    }

    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        Self::snapshot(&self.failures_by_kind)
    }

    pub fn get_verdicts_by_tier(&self) -> HashMap<String, u64> {
        Self::snapshot(&self.verdicts_by_tier)
    }

    pub fn get_fallbacks_by_field(&self) -> HashMap<String, u64> {
        Self::snapshot(&self.fallbacks_by_field)
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let requests = self.requests.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let hashed = self.hash_fallback_requests.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            requests,
            predictions = self.predictions.load(Ordering::Relaxed),
            failures,
            throughput = format!("{:.1} req/s", self.get_throughput()),
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            "Metrics summary"
        );

        for (domain, count) in &self.get_predictions_by_domain() {
            info!(domain = %domain, count, "Predictions by domain");
        }
        for (tier, count) in &self.get_verdicts_by_tier() {
            info!(tier = %tier, count, "Verdicts by risk tier");
        }
        for (kind, count) in &self.get_failures_by_kind() {
            info!(kind = %kind, count, "Failures by kind");
        }

        let score_dist = self.get_score_distribution();
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate().filter(|(_, c)| **c > 0) {
            let pct = (count as f64 / total as f64) * 100.0;
            info!(
                "Probability {:.1}-{:.1}: {:>6} ({:>5.1}%)",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct
            );
        }

        // Degraded-mode encodings are worth attention
        if hashed > 0 {
            warn!(requests = hashed, "Requests scored with hash-based categorical fallback");
        }
        for (field, count) in &self.get_fallbacks_by_field() {
            info!(field = %field, count, "Fallback encodings");
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics summary logger
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
