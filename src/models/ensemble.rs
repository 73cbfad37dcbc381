//! Three-model voting ensemble

use crate::error::{PipelineError, Result};
use crate::models::vote::majority_vote;
use crate::models::{ModelRole, RiskModel, DECISION_THRESHOLD};
use crate::types::PredictionResult;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Majority vote over a tree ensemble, a boosted model and a network.
///
/// The network's probability is passed through untouched as the headline
/// `default_probability`. Models are read-only after construction, so one
/// predictor serves any number of concurrent requests.
pub struct EnsemblePredictor {
    tree: Arc<dyn RiskModel>,
    boosted: Arc<dyn RiskModel>,
    network: Arc<dyn RiskModel>,
    feature_names: Option<Vec<String>>,
}

impl EnsemblePredictor {
    pub fn new(
        tree: Arc<dyn RiskModel>,
        boosted: Arc<dyn RiskModel>,
        network: Arc<dyn RiskModel>,
    ) -> Self {
        Self {
            tree,
            boosted,
            network,
            feature_names: None,
        }
    }

    /// Assemble from optionally loaded models, failing on the first gap
    pub fn from_slots(
        tree: Option<Arc<dyn RiskModel>>,
        boosted: Option<Arc<dyn RiskModel>>,
        network: Option<Arc<dyn RiskModel>>,
    ) -> Result<Self> {
        let require = |slot: Option<Arc<dyn RiskModel>>, role: ModelRole| {
            slot.ok_or_else(|| PipelineError::ModelUnavailable {
                model: role.to_string(),
                reason: "model was not loaded".to_string(),
            })
        };

        Ok(Self::new(
            require(tree, ModelRole::TreeEnsemble)?,
            require(boosted, ModelRole::BoostedTrees)?,
            require(network, ModelRole::NeuralNetwork)?,
        ))
    }

    /// Column names used to key the tree model's importances
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Models in vote order
    pub fn models(&self) -> [(ModelRole, &dyn RiskModel); 3] {
        [
            (ModelRole::TreeEnsemble, self.tree.as_ref()),
            (ModelRole::BoostedTrees, self.boosted.as_ref()),
            (ModelRole::NeuralNetwork, self.network.as_ref()),
        ]
    }

    /// Every model with a known width must accept `width` columns
    pub fn check_shape(&self, width: usize) -> Result<()> {
        for (_, model) in self.models() {
            if let Some(expected) = model.input_width() {
                if expected != width {
                    return Err(PipelineError::FeatureVectorShapeError {
                        model: model.name().to_string(),
                        expected,
                        actual: width,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn predict(&self, features: &[f32]) -> Result<PredictionResult> {
        self.predict_with_timings(features).map(|(result, _)| result)
    }

    /// Score one vector and report how long each model took, in vote order
    pub fn predict_with_timings(&self, features: &[f32]) -> Result<(PredictionResult, [Duration; 3])> {
        self.check_shape(features.len())?;

        let start = Instant::now();
        let tree_prediction = self.tree.predict_label(features)?;
        let tree_time = start.elapsed();

        let start = Instant::now();
        let boosted_prediction = self.boosted.predict_label(features)?;
        let boosted_time = start.elapsed();

        let start = Instant::now();
        let default_probability = self.network.predict_probability(features)?;
        let network_time = start.elapsed();
        let network_prediction = u8::from(default_probability > DECISION_THRESHOLD);

        let ensemble_prediction =
            majority_vote(&[tree_prediction, boosted_prediction, network_prediction]);

        debug!(
            tree = tree_prediction,
            boosted = boosted_prediction,
            network = network_prediction,
            ensemble = ensemble_prediction,
            probability = default_probability,
            "Ensemble vote complete"
        );

        let result = PredictionResult {
            tree_prediction,
            boosted_prediction,
            network_prediction,
            ensemble_prediction,
            default_probability,
            feature_importance: self.importance_map(),
        };

        Ok((result, [tree_time, boosted_time, network_time]))
    }

    fn importance_map(&self) -> Option<BTreeMap<String, f64>> {
        let importances = self.tree.feature_importances()?;
        let names = self.feature_names.as_ref()?;

        if importances.len() != names.len() {
            warn!(
                model = %self.tree.name(),
                importances = importances.len(),
                names = names.len(),
                "Importance count does not match feature names, omitting"
            );
            return None;
        }

        Some(names.iter().cloned().zip(importances.iter().copied()).collect())
    }
}
