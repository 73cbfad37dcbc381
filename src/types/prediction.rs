//! Ensemble prediction result

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of scoring one application with the three-model ensemble.
///
/// `default_probability` is the neural network's raw output, not a blend of
/// the three models, while `ensemble_prediction` is a majority vote across
/// all three. Both are reported as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Tree-ensemble (random forest) label
    #[serde(rename = "model1_prediction")]
    pub tree_prediction: u8,

    /// Gradient-boosted model label
    #[serde(rename = "model2_prediction")]
    pub boosted_prediction: u8,

    /// Neural network label (probability > 0.5)
    #[serde(rename = "model3_prediction")]
    pub network_prediction: u8,

    /// Majority vote over the three labels
    pub ensemble_prediction: u8,

    /// Neural network default probability
    pub default_probability: f64,

    /// Tree-ensemble feature importances keyed by feature name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<BTreeMap<String, f64>>,
}

impl PredictionResult {
    /// Individual labels in model order (tree, boosted, network)
    pub fn votes(&self) -> [u8; 3] {
        [
            self.tree_prediction,
            self.boosted_prediction,
            self.network_prediction,
        ]
    }

    /// Whether the ensemble flags the application as a likely defaulter
    pub fn is_default(&self) -> bool {
        self.ensemble_prediction == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let result = PredictionResult {
            tree_prediction: 1,
            boosted_prediction: 0,
            network_prediction: 1,
            ensemble_prediction: 1,
            default_probability: 0.73,
            feature_importance: None,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["model1_prediction"], 1);
        assert_eq!(json["model2_prediction"], 0);
        assert_eq!(json["model3_prediction"], 1);
        assert_eq!(json["default_probability"], 0.73);
        assert!(json.get("feature_importance").is_none());

        let back: PredictionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.votes(), [1, 0, 1]);
        assert!(back.is_default());
    }
}
