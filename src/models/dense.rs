//! Native feed-forward network loaded from a JSON weight dump.
//!
//! The file holds the dense layers of a Keras `Sequential` model in order.
//! Dropout layers are inference no-ops and are not stored.
//!
//! ```json
//! {"layers": [{"weights": [[...], ...], "bias": [...], "activation": "relu"}, ...]}
//! ```
//!
//! `weights` is `[units][inputs]`. The last layer must have a single unit.

use crate::error::{PipelineError, Result};
use crate::models::RiskModel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    Linear,
}

impl Activation {
    fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Linear => x,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    fn inputs(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| {
                let z: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias;
                self.activation.apply(z)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NetworkFile {
    layers: Vec<DenseLayer>,
    #[serde(default)]
    feature_importances: Option<Vec<f64>>,
}

/// Feed-forward network evaluated in process
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    name: String,
    layers: Vec<DenseLayer>,
    importances: Option<Vec<f64>>,
}

impl DenseNetwork {
    /// Build from layers, checking that consecutive shapes line up
    pub fn new(name: &str, layers: Vec<DenseLayer>) -> Result<Self> {
        let invalid = |reason: String| PipelineError::InvalidInput(format!("{}: {}", name, reason));

        let first = layers
            .first()
            .ok_or_else(|| invalid("network has no layers".to_string()))?;
        let mut width = first.inputs();
        if width == 0 {
            return Err(invalid("first layer has no inputs".to_string()));
        }

        for (i, layer) in layers.iter().enumerate() {
            if layer.weights.len() != layer.bias.len() {
                return Err(invalid(format!(
                    "layer {} has {} weight rows but {} biases",
                    i,
                    layer.weights.len(),
                    layer.bias.len()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != width) {
                return Err(invalid(format!("layer {} expects {} inputs", i, width)));
            }
            width = layer.bias.len();
        }

        if width != 1 {
            return Err(invalid(format!("output layer has {} units, expected 1", width)));
        }

        Ok(Self {
            name: name.to_string(),
            layers,
            importances: None,
        })
    }

    pub fn from_json(name: &str, bytes: &[u8]) -> Result<Self> {
        let file: NetworkFile = serde_json::from_slice(bytes)?;
        let mut network = Self::new(name, file.layers)?;
        network.importances = file.feature_importances;
        Ok(network)
    }

    pub fn load<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref();
        let network = Self::from_json(name, &fs::read(path)?)?;
        info!(
            model = %name,
            path = %path.display(),
            layers = network.layers.len(),
            inputs = network.layers[0].inputs(),
            "Dense network loaded"
        );
        Ok(network)
    }

    pub fn with_importances(mut self, importances: Vec<f64>) -> Self {
        self.importances = Some(importances);
        self
    }
}

impl RiskModel for DenseNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        self.layers.first().map(DenseLayer::inputs)
    }

    fn predict_probability(&self, features: &[f32]) -> Result<f64> {
        let width = self.layers[0].inputs();
        if features.len() != width {
            return Err(PipelineError::FeatureVectorShapeError {
                model: self.name.clone(),
                expected: width,
                actual: features.len(),
            });
        }

        let mut activations: Vec<f64> = features.iter().map(|&x| x as f64).collect();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }

        let prob = activations[0];
        if !(0.0..=1.0).contains(&prob) {
            return Err(PipelineError::inference(
                &self.name,
                format!("output {} is not a probability", prob),
            ));
        }
        Ok(prob)
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }
}
