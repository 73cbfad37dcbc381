//! Model artifact loader

use crate::config::{ModelFormat, ModelSpec, ModelsConfig};
use crate::error::PipelineError;
use crate::models::{DenseNetwork, EnsemblePredictor, ModelRole, OnnxModel, RiskModel};
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Loads the three ensemble members from their configured artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
    /// ONNX Runtime is only initialized once an ONNX artifact shows up
    ort_ready: Cell<bool>,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
            ort_ready: Cell::new(false),
        }
    }

    fn init_ort(&self) -> Result<()> {
        if !self.ort_ready.get() {
            ort::init().commit()?;
            info!(onnx_threads = self.onnx_threads, "ONNX Runtime initialized");
            self.ort_ready.set(true);
        }
        Ok(())
    }

    /// Load one model, attaching its declared width and importance sidecar
    pub fn load_model(&self, spec: &ModelSpec, name: &str) -> Result<Arc<dyn RiskModel>> {
        if !spec.path.exists() {
            bail!("Model file not found: {}", spec.path.display());
        }

        let importances = spec
            .importances_path
            .as_deref()
            .and_then(|path| match read_json::<Vec<f64>>(path) {
                Ok(importances) => Some(importances),
                Err(e) => {
                    let reason = format!("{:#}", e);
                    warn!(
                        model = %name,
                        path = %path.display(),
                        error = %reason,
                        "Importances unavailable, loading model without them"
                    );
                    None
                }
            });

        let model: Arc<dyn RiskModel> = match detect_format(spec) {
            ModelFormat::Onnx => {
                self.init_ort()?;
                let mut model = OnnxModel::load(&spec.path, name, self.onnx_threads)?;
                if let Some(width) = reconcile_width(name, spec.input_width, model.input_width())? {
                    model = model.with_input_width(width);
                }
                if let Some(importances) = importances {
                    model = model.with_importances(importances);
                }
                Arc::new(model)
            }
            ModelFormat::DenseJson | ModelFormat::Auto => {
                let mut model = DenseNetwork::load(&spec.path, name)
                    .with_context(|| format!("Failed to load model from {:?}", spec.path))?;
                reconcile_width(name, spec.input_width, model.input_width())?;
                if let Some(importances) = importances {
                    model = model.with_importances(importances);
                }
                Arc::new(model)
            }
        };

        if model.input_width().is_none() {
            warn!(model = %name, "Input width unknown, shape is not checked for this model");
        }

        Ok(model)
    }

    /// Load every ensemble member. A member that fails to load makes the
    /// whole ensemble unavailable.
    pub fn load_ensemble(
        &self,
        config: &ModelsConfig,
        feature_names: Option<Vec<String>>,
    ) -> std::result::Result<EnsemblePredictor, PipelineError> {
        let mut failures = Vec::new();
        let mut load = |role: ModelRole, spec: &ModelSpec| match self.load_model(spec, role.as_str()) {
            Ok(model) => Some(model),
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(model = %role, path = %spec.path.display(), error = %reason, "Failed to load model");
                failures.push((role, reason));
                None
            }
        };

        let tree = load(ModelRole::TreeEnsemble, &config.tree);
        let boosted = load(ModelRole::BoostedTrees, &config.boosted);
        let network = load(ModelRole::NeuralNetwork, &config.network);

        if let Some((role, reason)) = failures.into_iter().next() {
            return Err(PipelineError::ModelUnavailable {
                model: role.to_string(),
                reason,
            });
        }

        let mut ensemble = EnsemblePredictor::from_slots(tree, boosted, network)?;
        if let Some(names) = feature_names {
            ensemble = ensemble.with_feature_names(names);
        }

        info!(count = ModelRole::ALL.len(), "Loaded ensemble models");
        Ok(ensemble)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_format(spec: &ModelSpec) -> ModelFormat {
    match spec.format {
        ModelFormat::Auto => match spec.path.extension().and_then(|ext| ext.to_str()) {
            Some("onnx") => ModelFormat::Onnx,
            _ => ModelFormat::DenseJson,
        },
        format => format,
    }
}

/// Settle a model's input width from the configured value and the one the
/// artifact itself reports. Both present and different is a load error.
fn reconcile_width(name: &str, declared: Option<usize>, actual: Option<usize>) -> Result<Option<usize>> {
    match (declared, actual) {
        (Some(declared), Some(actual)) if declared != actual => bail!(
            "{} declares input width {} but the artifact takes {}",
            name,
            declared,
            actual
        ),
        (declared, actual) => Ok(actual.or(declared)),
    }
}

/// Read a JSON document such as an importance sidecar or a feature-name list
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}
