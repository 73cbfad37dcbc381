//! Request-facing scoring context

use crate::config::AppConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::PipelineMetrics;
use crate::models::loader::{read_json, ModelLoader};
use crate::models::{EnsemblePredictor, ModelRole};
use crate::preprocessing::PreprocessingPipeline;
use crate::synthetic::SyntheticGenerator;
use crate::types::{LoanApplication, PredictionResult, SyntheticRequest};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A generated application together with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticPrediction {
    pub application: LoanApplication,
    pub prediction: PredictionResult,
}

/// Fitted pipeline, ensemble and generator, loaded once and then shared
/// read-only between requests.
pub struct RiskService {
    pipeline: PreprocessingPipeline,
    ensemble: EnsemblePredictor,
    generator: SyntheticGenerator,
    metrics: Arc<PipelineMetrics>,
}

impl RiskService {
    /// Assemble from loaded parts. The ensemble must accept the pipeline's
    /// output width.
    pub fn new(
        pipeline: PreprocessingPipeline,
        ensemble: EnsemblePredictor,
        generator: SyntheticGenerator,
    ) -> Result<Self> {
        let width = pipeline.width()?;
        ensemble.check_shape(width)?;

        Ok(Self {
            pipeline,
            ensemble,
            generator,
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    /// Load every artifact named in the configuration
    pub fn load(config: &AppConfig) -> anyhow::Result<Self> {
        let pipeline = PreprocessingPipeline::load_from_path(&config.models.pipeline_path)
            .with_context(|| {
                format!(
                    "Failed to load pipeline from {}",
                    config.models.pipeline_path.display()
                )
            })?;

        let feature_names = Self::feature_names(config, &pipeline)?;
        let width = pipeline.width()?;
        if feature_names.len() != width {
            warn!(
                names = feature_names.len(),
                width = width,
                "Feature name count differs from pipeline width"
            );
        }

        let loader = ModelLoader::with_threads(config.models.onnx_threads);
        let ensemble = loader.load_ensemble(&config.models, Some(feature_names))?;

        let service = Self::new(
            pipeline,
            ensemble,
            SyntheticGenerator::new(config.synthetic.clone()),
        )?;

        info!(
            width = width,
            pipeline = %config.models.pipeline_path.display(),
            legacy_home_ownership = config.synthetic.legacy_home_ownership,
            "Risk service ready"
        );
        Ok(service)
    }

    /// Names for the importance map. An unreadable names file falls back to
    /// the vocabulary's column names.
    fn feature_names(config: &AppConfig, pipeline: &PreprocessingPipeline) -> Result<Vec<String>> {
        if let Some(path) = &config.models.feature_names_path {
            match read_json::<Vec<String>>(path) {
                Ok(names) => return Ok(names),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Feature names unavailable, using pipeline column names"
                ),
            }
        }
        pipeline.feature_names()
    }

    /// Share an external metrics collector
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn pipeline(&self) -> &PreprocessingPipeline {
        &self.pipeline
    }

    pub fn ensemble(&self) -> &EnsemblePredictor {
        &self.ensemble
    }

    /// Validate, encode and score one application
    pub fn predict(&self, application: &LoanApplication) -> Result<PredictionResult> {
        let start = Instant::now();
        match self.score(application) {
            Ok(result) => {
                self.metrics.record_prediction(start.elapsed(), &result);
                Ok(result)
            }
            Err(e) => {
                self.metrics.record_failure(e.kind());
                Err(e)
            }
        }
    }

    fn score(&self, application: &LoanApplication) -> Result<PredictionResult> {
        application.validate()?;
        let features = self.pipeline.transform(application)?;
        let (result, timings) = self.ensemble.predict_with_timings(&features)?;

        for (role, elapsed) in ModelRole::ALL.iter().zip(timings) {
            self.metrics.record_model_time(role.as_str(), elapsed);
        }

        debug!(
            ensemble = result.ensemble_prediction,
            probability = result.default_probability,
            "Application scored"
        );
        Ok(result)
    }

    pub fn generate_synthetic(&self, request: &SyntheticRequest) -> Result<Vec<LoanApplication>> {
        request.validate()?;
        self.generator.generate(request.count, request.default_ratio)
    }

    /// Generate applications and score each one. Any scoring failure fails
    /// the whole request.
    pub fn predict_synthetic(&self, request: &SyntheticRequest) -> Result<Vec<SyntheticPrediction>> {
        self.generate_synthetic(request)?
            .into_iter()
            .map(|application| {
                let prediction = self.predict(&application)?;
                Ok(SyntheticPrediction {
                    application,
                    prediction,
                })
            })
            .collect::<std::result::Result<Vec<_>, PipelineError>>()
    }
}
