//! Synthetic Application Producer
//!
//! Generates synthetic loan applications and sends each one to the scoring
//! service as a prediction request.
//!
//! ```text
//! synthetic-producer [nats_url] [subject] [count] [default_ratio] [delay_ms]
//! ```

use loan_default_pipeline::synthetic::{LabelledApplication, SyntheticConfig, SyntheticGenerator};
use loan_default_pipeline::types::{ApiResponse, PredictionResult};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("synthetic_producer=info".parse()?),
        )
        .init();

    info!("Starting Synthetic Application Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("loan.predict");
    let count: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let default_ratio: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.3);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        default_ratio = default_ratio,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let generator = SyntheticGenerator::new(SyntheticConfig::default());
    let applications = generator.generate_labelled(count, default_ratio)?;

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(&applications, delay_ms).await;
        }
    };

    info!("Sending {} prediction requests...", applications.len());

    let mut agreed = 0usize;
    let mut failed = 0usize;

    for (i, labelled) in applications.iter().enumerate() {
        let payload = serde_json::to_vec(&labelled.application)?;
        let message = client.request(subject.to_string(), payload.into()).await?;
        let reply: ApiResponse<PredictionResult> = serde_json::from_slice(&message.payload)?;

        match (&reply.data, &reply.error) {
            (Some(prediction), _) => {
                if prediction.is_default() == labelled.likely_default {
                    agreed += 1;
                }
            }
            (None, error) => {
                failed += 1;
                warn!(request_id = %reply.request_id, error = ?error, "Prediction failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} requests ({} matched profile, {} failed)",
                i + 1,
                applications.len(),
                agreed,
                failed
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} requests ({} matched profile, {} failed)",
        applications.len(),
        agreed,
        failed
    );

    Ok(())
}

async fn run_dry_mode(applications: &[LabelledApplication], delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    for (i, labelled) in applications.iter().enumerate() {
        let json = serde_json::to_string_pretty(labelled)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample application {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
