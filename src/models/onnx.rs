//! ONNX Runtime adapter for exported classifiers

use crate::error::{PipelineError, Result};
use crate::models::{RiskModel, DECISION_THRESHOLD};
use anyhow::Context;
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Classifier exported to ONNX (sklearn, XGBoost or Keras converters).
///
/// A session run needs exclusive access, so the session sits behind a
/// mutex. Nothing else about the model changes after loading.
pub struct OnnxModel {
    name: String,
    session: Mutex<Session>,
    input_name: String,
    probability_output: String,
    label_output: Option<String>,
    input_width: Option<usize>,
    importances: Option<Vec<f64>>,
}

impl OnnxModel {
    /// Load a model file and discover its input and output names
    pub fn load<P: AsRef<Path>>(path: P, name: &str, threads: usize) -> anyhow::Result<Self> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // exporters report [-1, n_features] for a dynamic batch
        let input_width = session
            .inputs
            .first()
            .and_then(|i| i.input_type.tensor_shape())
            .and_then(|shape| width_from_dims(&shape.iter().copied().collect::<Vec<i64>>()));

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let output_names: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        let probability_output = probability_output_name(&output_names)
            .unwrap_or("probabilities")
            .to_string();

        info!(
            model = %name,
            input = %input_name,
            input_width = ?input_width,
            probability_output = %probability_output,
            label_output = ?label_output,
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            probability_output,
            label_output,
            input_width,
            importances: None,
        })
    }

    /// Set the feature width when the graph does not report one
    pub fn with_input_width(mut self, width: usize) -> Self {
        self.input_width = Some(width);
        self
    }

    /// Attach importances exported alongside the model
    pub fn with_importances(mut self, importances: Vec<f64>) -> Self {
        self.importances = Some(importances);
        self
    }

    /// Run the session once and hand the outputs to `extract`
    fn run<T>(
        &self,
        features: &[f32],
        extract: impl FnOnce(&SessionOutputs) -> Result<T>,
    ) -> Result<T> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| PipelineError::inference(&self.name, format!("Lock error: {}", e)))?;

        // [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.to_vec()))
            .map_err(|e| PipelineError::inference(&self.name, e))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(|e| PipelineError::inference(&self.name, e))?;

        extract(&outputs)
    }

    /// Default-class probability from tensor or seq(map) outputs
    fn extract_probability(&self, outputs: &SessionOutputs) -> Result<f64> {
        if let Some(output) = outputs.get(self.probability_output.as_str()) {
            if let Some(prob) = self.probability_from_value(output) {
                return Ok(prob);
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(prob) = self.probability_from_value(&output) {
                debug!(model = %self.name, output = %name, prob = prob, "Extracted probability (fallback)");
                return Ok(prob);
            }
        }

        Err(PipelineError::inference(
            &self.name,
            "no probability output could be extracted",
        ))
    }

    fn probability_from_value(&self, output: &ort::value::DynValue) -> Option<f64> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let prob = positive_class_probability(&dims, data)?;
            debug!(model = %self.name, prob = prob, "Extracted from tensor");
            return Some(prob);
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            return self.extract_from_sequence_map(output).ok();
        }

        None
    }

    /// seq(map(int64, float)) as produced by sklearn zipmap and LightGBM exports
    fn extract_from_sequence_map(&self, output: &ort::value::DynValue) -> Result<f64> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| PipelineError::inference(&self.name, e))?;

        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(|e| PipelineError::inference(&self.name, e))?;

        // batch size is always 1
        let map_value = maps
            .first()
            .ok_or_else(|| PipelineError::inference(&self.name, "Empty sequence"))?;

        let kv_pairs = map_value
            .try_extract_key_values::<i64, f32>()
            .map_err(|e| PipelineError::inference(&self.name, e))?;

        if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
            debug!(model = %self.name, prob = *prob, "Extracted from seq(map)");
            return Ok(*prob as f64);
        }
        if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 0) {
            return Ok(1.0 - *prob as f64);
        }

        Err(PipelineError::inference(&self.name, "No probability found in map"))
    }

    fn extract_label(&self, outputs: &SessionOutputs, label_output: &str) -> Result<u8> {
        let output = outputs.get(label_output).ok_or_else(|| {
            PipelineError::inference(&self.name, format!("missing output {}", label_output))
        })?;

        let (_, data) = output
            .try_extract_tensor::<i64>()
            .map_err(|e| PipelineError::inference(&self.name, e))?;

        match data.first() {
            Some(&label) => Ok(u8::from(label != 0)),
            None => Err(PipelineError::inference(&self.name, "empty label tensor")),
        }
    }
}

/// Feature width from a graph input shape: the last dimension, when fixed
fn width_from_dims(dims: &[i64]) -> Option<usize> {
    dims.last().filter(|&&d| d > 0).map(|&d| d as usize)
}

/// Output carrying class probabilities. Label outputs never qualify, even
/// when named like `output_label`.
fn probability_output_name<'a>(names: &[&'a str]) -> Option<&'a str> {
    let candidates = || names.iter().copied().filter(|name| !name.contains("label"));
    candidates()
        .find(|name| name.contains("prob") || name.contains("output"))
        .or_else(|| candidates().last())
}

/// Pick the default-class probability out of a probability tensor.
///
/// The last dimension counts classes. With two or more the default class is
/// index 1; a single column is the default probability itself.
fn positive_class_probability(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = match dims.last() {
        Some(&classes) => classes,
        None => return data.first().map(|&v| v as f64),
    };

    match classes {
        c if c <= 0 => None,
        1 => data.first().map(|&v| v as f64),
        _ => data.get(1).map(|&v| v as f64),
    }
}

impl RiskModel for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    fn predict_probability(&self, features: &[f32]) -> Result<f64> {
        self.run(features, |outputs| self.extract_probability(outputs))
    }

    fn predict_label(&self, features: &[f32]) -> Result<u8> {
        match &self.label_output {
            Some(label_output) => {
                self.run(features, |outputs| self.extract_label(outputs, label_output))
            }
            None => Ok(u8::from(
                self.predict_probability(features)? > DECISION_THRESHOLD,
            )),
        }
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }
}
