//! Pipeline Fitting Tool
//!
//! Fits the preprocessing pipeline on JSON-lines training records and writes
//! the artifacts the scoring service loads.
//!
//! ```text
//! fit-pipeline <training.jsonl> [output_dir] [--matrix] [--smote]
//! ```
//!
//! Every record carries the application fields plus a `risk_flag` label.
//! `--matrix` also writes the scaled training matrix for offline trainers,
//! and `--smote` balances that matrix first.

use anyhow::{bail, Context, Result};
use loan_default_pipeline::preprocessing::{PreprocessingPipeline, Smote};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::info;

const LABEL_FIELD: &str = "risk_flag";

#[derive(Serialize)]
struct TrainingMatrix {
    feature_names: Vec<String>,
    rows: Vec<Vec<f32>>,
    labels: Vec<u8>,
    resampled: bool,
}

fn read_records(path: &Path) -> Result<(Vec<Map<String, Value>>, Vec<u8>)> {
    let file = fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mut records = Vec::new();
    let mut labels = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: Map<String, Value> = serde_json::from_str(&line)
            .with_context(|| format!("Line {} is not a JSON object", i + 1))?;
        let label = match record.get(LABEL_FIELD) {
            Some(Value::Bool(flag)) => u8::from(*flag),
            Some(value) => match value.as_u64() {
                Some(0) => 0,
                Some(1) => 1,
                _ => bail!("Line {}: {} must be 0 or 1, got {}", i + 1, LABEL_FIELD, value),
            },
            None => bail!("Line {}: missing {}", i + 1, LABEL_FIELD),
        };

        records.push(record);
        labels.push(label);
    }

    Ok((records, labels))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_vec_pretty(value)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote artifact");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fit_pipeline=info".parse()?)
                .add_directive("loan_default_pipeline=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let flags: Vec<&str> = args
        .iter()
        .filter(|a| a.starts_with("--"))
        .map(String::as_str)
        .collect();
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let Some(input) = positional.first() else {
        bail!("usage: fit-pipeline <training.jsonl> [output_dir] [--matrix] [--smote]");
    };
    let output_dir = positional
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("models"));
    let write_matrix = flags.contains(&"--matrix");
    let resample = flags.contains(&"--smote");

    let (records, labels) = read_records(Path::new(input.as_str()))?;
    let defaults = labels.iter().filter(|&&l| l == 1).count();
    info!(
        records = records.len(),
        defaults = defaults,
        non_defaults = records.len() - defaults,
        "Training records loaded"
    );

    let mut pipeline = PreprocessingPipeline::new();
    let (rows, matrix_labels) = if resample {
        pipeline.fit_transform_resampled(&records, &labels, &Smote::new())?
    } else {
        (pipeline.fit_transform(&records, &labels)?, labels.clone())
    };

    fs::create_dir_all(&output_dir)?;
    pipeline.save_to_path(output_dir.join("pipeline.json"))?;

    let feature_names = pipeline.feature_names()?;
    write_json(&output_dir.join("feature_names.json"), &feature_names)?;

    if write_matrix {
        write_json(
            &output_dir.join("training_matrix.json"),
            &TrainingMatrix {
                feature_names,
                rows,
                labels: matrix_labels,
                resampled: resample,
            },
        )?;
    }

    info!(
        width = pipeline.width()?,
        output = %output_dir.display(),
        "Pipeline fitted"
    );
    Ok(())
}
