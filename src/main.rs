//! Loan Default Pipeline - Main Entry Point
//!
//! Loads the fitted pipeline and the three ensemble models, then answers
//! prediction and synthetic-data requests over NATS request/reply.

use anyhow::Result;
use futures::StreamExt;
use loan_default_pipeline::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    consumer::{handle_request, RequestConsumer},
    metrics::{MetricsReporter, PipelineMetrics},
    producer::ReplyPublisher,
    service::RiskService,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("loan_default_pipeline={}", logging.level).parse()?);

    match logging.format.as_str() {
        "pretty" => tracing_subscriber::fmt().with_env_filter(filter).pretty().init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    let config_path = config_path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

    init_tracing(&config.logging)?;
    info!(config = %config_path, "Starting Loan Default Pipeline");

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Load pipeline and models; nothing is served if this fails
    let service = Arc::new(RiskService::load(&config)?.with_metrics(metrics.clone()));

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats);
    let publisher = ReplyPublisher::new(client.clone());

    let num_workers = config.pipeline.workers.max(1);
    info!(
        workers = num_workers,
        subjects = ?consumer.subjects().collect::<Vec<_>>(),
        "Starting request loop"
    );

    // Semaphore to limit concurrent scoring
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let handled_count = Arc::new(AtomicU64::new(0));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut requests = consumer.subscribe().await?;

    while let Some(message) = requests.next().await {
        let Some(route) = consumer.route(&message.subject) else {
            warn!(subject = %message.subject, "Message on unrouted subject");
            continue;
        };

        let permit = semaphore.clone().acquire_owned().await?;

        let service = service.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();
        let handled_count = handled_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let payload = message.payload.to_vec();

            // Inference is CPU bound
            let reply =
                tokio::task::spawn_blocking(move || handle_request(&service, route, &payload)).await;

            match reply {
                Ok(Ok(bytes)) => match publisher.reply(message.reply, bytes).await {
                    Ok(_) => debug!(
                        route = route.as_str(),
                        processing_time_us = start_time.elapsed().as_micros(),
                        "Request handled"
                    ),
                    Err(e) => error!(route = route.as_str(), error = %e, "Failed to publish reply"),
                },
                Ok(Err(e)) => error!(route = route.as_str(), error = %e, "Failed to encode reply"),
                Err(e) => error!(route = route.as_str(), error = %e, "Request task panicked"),
            }

            let count = handled_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let stats = metrics.get_processing_stats();
                info!(
                    handled = count,
                    throughput = format!("{:.1} req/s", metrics.get_throughput()),
                    avg_latency_us = stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
