//! Configuration management for the loan default pipeline

use crate::synthetic::SyntheticConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub synthetic: SyntheticConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject answering single application predictions
    #[serde(default = "default_predict_subject")]
    pub predict_subject: String,
    /// Subject answering synthetic generation requests
    #[serde(default = "default_synthetic_subject")]
    pub synthetic_subject: String,
    /// Subject answering generate-then-predict requests
    #[serde(default = "default_predict_synthetic_subject")]
    pub predict_synthetic_subject: String,
}

fn default_predict_subject() -> String {
    "loan.predict".to_string()
}

fn default_synthetic_subject() -> String {
    "loan.synthetic.generate".to_string()
}

fn default_predict_synthetic_subject() -> String {
    "loan.synthetic.predict".to_string()
}

/// On-disk format of a model artifact
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// Decide from the file extension
    #[default]
    Auto,
    Onnx,
    DenseJson,
}

/// Location and format of a single model
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub format: ModelFormat,
    /// Feature width the model was exported with, when the format does not carry it
    #[serde(default)]
    pub input_width: Option<usize>,
    /// JSON array of per-column importances
    #[serde(default)]
    pub importances_path: Option<PathBuf>,
}

impl ModelSpec {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            format: ModelFormat::Auto,
            input_width: None,
            importances_path: None,
        }
    }
}

/// Fitted artifacts loaded at startup
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Random forest (first vote, importances source)
    pub tree: ModelSpec,
    /// Gradient-boosted trees (second vote)
    pub boosted: ModelSpec,
    /// Feed-forward network (third vote, headline probability)
    pub network: ModelSpec,
    /// Persisted preprocessing pipeline
    pub pipeline_path: PathBuf,
    /// JSON array of column names, overriding the vocabulary's names
    #[serde(default)]
    pub feature_names_path: Option<PathBuf>,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Request handling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum requests scored concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_workers() -> usize {
    4
}

fn default_metrics_interval() -> u64 {
    30
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            metrics_interval_secs: default_metrics_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Configuration file read when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path, then apply `LOAN__*` overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("LOAN").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                predict_subject: default_predict_subject(),
                synthetic_subject: default_synthetic_subject(),
                predict_synthetic_subject: default_predict_synthetic_subject(),
            },
            models: ModelsConfig {
                tree: ModelSpec::new("models/random_forest.onnx"),
                boosted: ModelSpec::new("models/xgboost.onnx"),
                network: ModelSpec::new("models/network.json"),
                pipeline_path: PathBuf::from("models/pipeline.json"),
                feature_names_path: Some(PathBuf::from("models/feature_names.json")),
                onnx_threads: default_onnx_threads(),
            },
            synthetic: SyntheticConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.predict_subject, "loan.predict");
        assert_eq!(config.models.onnx_threads, 1);
        assert_eq!(config.models.tree.format, ModelFormat::Auto);
        assert!(!config.synthetic.legacy_home_ownership);
    }

    #[test]
    fn test_load_minimal_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[nats]
url = "nats://example:4222"

[models]
pipeline_path = "artifacts/pipeline.json"
onnx_threads = 2

[models.tree]
path = "artifacts/model1.onnx"
input_width = 90
importances_path = "artifacts/model1_importances.json"

[models.boosted]
path = "artifacts/model2.onnx"
format = "onnx"

[models.network]
path = "artifacts/model3.json"
format = "dense_json"

[logging]
level = "debug"
format = "pretty"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.url, "nats://example:4222");
        assert_eq!(config.nats.synthetic_subject, "loan.synthetic.generate");
        assert_eq!(config.models.tree.input_width, Some(90));
        assert_eq!(config.models.boosted.format, ModelFormat::Onnx);
        assert_eq!(config.models.network.format, ModelFormat::DenseJson);
        assert_eq!(config.models.onnx_threads, 2);
        assert!(config.models.feature_names_path.is_none());
        assert_eq!(config.pipeline.workers, 4);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_shipped_config() {
        // unit tests run from the package root, where the shipped file lives
        let config = AppConfig::load().unwrap();
        assert_eq!(config.models.tree.path, PathBuf::from("models/model1.onnx"));
        assert_eq!(config.models.network.format, ModelFormat::DenseJson);
        assert!(config.models.tree.importances_path.is_some());
    }
}
