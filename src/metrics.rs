//! Performance metrics and statistics tracking for the scoring service.

use crate::models::vote::agreement;
use crate::types::PredictionResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;
const MAX_MODEL_SAMPLES: usize = 1_000;

/// Metrics collector for the scoring service
pub struct PipelineMetrics {
    /// Applications scored successfully
    pub predictions: AtomicU64,
    /// Requests that ended in an error reply
    pub failures: AtomicU64,
    /// Predictions by ensemble label (0, 1)
    labels: [AtomicU64; 2],
    /// Failures keyed by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// End-to-end scoring times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Per-model inference times (in microseconds)
    model_times: RwLock<HashMap<String, Vec<u64>>>,
    /// Default probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    /// Share of models agreeing with the ensemble label
    model_agreements: RwLock<Vec<f64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            labels: [AtomicU64::new(0), AtomicU64::new(0)],
            failures_by_kind: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            model_times: RwLock::new(HashMap::new()),
            probability_buckets: RwLock::new([0; 10]),
            model_agreements: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, processing_time: Duration, result: &PredictionResult) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        self.labels[usize::from(result.ensemble_prediction.min(1))].fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }

        let bucket = (result.default_probability * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut agreements) = self.model_agreements.write() {
            agreements.push(agreement(&result.votes(), result.ensemble_prediction));
            if agreements.len() > MAX_MODEL_SAMPLES {
                agreements.drain(0..MAX_MODEL_SAMPLES / 2);
            }
        }
    }

    /// Record a failed request by error kind
    pub fn record_failure(&self, kind: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Record model inference time
    pub fn record_model_time(&self, model_name: &str, duration: Duration) {
        if let Ok(mut times) = self.model_times.write() {
            let model_times = times.entry(model_name.to_string()).or_default();
            model_times.push(duration.as_micros() as u64);
            if model_times.len() > MAX_MODEL_SAMPLES {
                model_times.drain(0..MAX_MODEL_SAMPLES / 2);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        ProcessingStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: percentile(&sorted, 0.50),
            p95_us: percentile(&sorted, 0.95),
            p99_us: percentile(&sorted, 0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get model performance stats
    pub fn get_model_stats(&self) -> HashMap<String, ModelStats> {
        let Ok(times) = self.model_times.read() else {
            return HashMap::new();
        };

        times
            .iter()
            .filter(|(_, model_times)| !model_times.is_empty())
            .map(|(model, model_times)| {
                let mut sorted = model_times.clone();
                sorted.sort_unstable();
                let count = sorted.len();
                (
                    model.clone(),
                    ModelStats {
                        calls: count as u64,
                        mean_us: sorted.iter().sum::<u64>() / count as u64,
                        p50_us: percentile(&sorted, 0.50),
                        p99_us: percentile(&sorted, 0.99),
                    },
                )
            })
            .collect()
    }

    /// Get average model agreement
    pub fn get_avg_agreement(&self) -> f64 {
        match self.model_agreements.read() {
            Ok(agreements) if !agreements.is_empty() => {
                agreements.iter().sum::<f64>() / agreements.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Predictions per ensemble label, `[repaid, default]`
    pub fn get_label_counts(&self) -> [u64; 2] {
        [
            self.labels[0].load(Ordering::Relaxed),
            self.labels[1].load(Ordering::Relaxed),
        ]
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .map(|by_kind| by_kind.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let [repaid, defaults] = self.get_label_counts();
        let default_rate = if predictions > 0 {
            (defaults as f64 / predictions as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let agreement = self.get_avg_agreement();
        let failures_by_kind = self.get_failures_by_kind();
        let distribution = self.get_probability_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            LOAN DEFAULT PIPELINE - METRICS SUMMARY           ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Predictions:      {:>8}  │  Throughput: {:>6.1} req/s       ║",
            predictions, throughput
        );
        info!(
            "║ Likely defaults:  {:>8}  │  Repaid: {:>8} ({:>5.1}% default) ║",
            defaults, repaid, default_rate
        );
        info!("║ Failed requests:  {:>8}                                   ║", failures);
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Scoring Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}   ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!(
            "║ Model Agreement: {:>5.1}% (share of votes matching ensemble)  ║",
            agreement * 100.0
        );
        if !failures_by_kind.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures by Kind:                                            ║");
            for (kind, count) in &failures_by_kind {
                info!("║   {:28}: {:>6}                          ║", kind, count);
            }
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Default Probability Distribution:                            ║");
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");

        let model_stats = self.get_model_stats();
        if !model_stats.is_empty() {
            info!("Model Inference Times (μs):");
            for (model, stats) in &model_stats {
                info!(
                    "  {}: mean={} p50={} p99={} (calls={})",
                    model, stats.mean_us, stats.p50_us, stats.p99_us, stats.calls
                );
            }
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile(sorted: &[u64], q: f64) -> u64 {
    let idx = ((sorted.len() as f64 * q) as usize).min(sorted.len().saturating_sub(1));
    sorted.get(idx).copied().unwrap_or(0)
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

/// Model-specific statistics
#[derive(Debug)]
pub struct ModelStats {
    pub calls: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
}

/// Periodic metrics summary
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
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
