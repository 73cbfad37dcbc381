//! Classifier adapters and the voting ensemble

pub mod dense;
pub mod ensemble;
pub mod loader;
pub mod onnx;
pub mod vote;

pub use dense::DenseNetwork;
pub use ensemble::EnsemblePredictor;
pub use loader::ModelLoader;
pub use onnx::OnnxModel;

use crate::error::Result;
use std::fmt;

/// Probability above which a model's output counts as a default vote
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Scoring interface shared by every model format.
///
/// Implementations are loaded once and shared read-only between requests.
pub trait RiskModel: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Feature vector width the model was trained on, if known
    fn input_width(&self) -> Option<usize>;

    /// Probability of default in [0, 1]
    fn predict_probability(&self, features: &[f32]) -> Result<f64>;

    /// Binary default label
    fn predict_label(&self, features: &[f32]) -> Result<u8> {
        Ok(u8::from(self.predict_probability(features)? > DECISION_THRESHOLD))
    }

    /// Per-column importance weights, aligned with the feature vector
    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }
}

/// Position of a model inside the ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    /// Random forest; its importances are reported
    TreeEnsemble,
    /// Gradient-boosted trees
    BoostedTrees,
    /// Feed-forward network; its probability is the headline score
    NeuralNetwork,
}

impl ModelRole {
    pub const ALL: [ModelRole; 3] = [
        ModelRole::TreeEnsemble,
        ModelRole::BoostedTrees,
        ModelRole::NeuralNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::TreeEnsemble => "tree_ensemble",
            ModelRole::BoostedTrees => "boosted_trees",
            ModelRole::NeuralNetwork => "neural_network",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
