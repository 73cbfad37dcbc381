//! Error taxonomy for preprocessing and ensemble scoring

use thiserror::Error;

/// Result alias used throughout the scoring core
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while encoding, scaling or scoring a loan application.
///
/// Every variant is request-local except `ModelUnavailable`, which only
/// occurs while the service is being assembled at startup.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("schema mismatch: required field `{field}` is missing")]
    SchemaMismatch { field: String },

    #[error("dimension mismatch: expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("incompatible pipeline state: expected {expected}, found {found}")]
    IncompatiblePipelineVersion { expected: String, found: String },

    #[error("model unavailable: {model}: {reason}")]
    ModelUnavailable { model: String, reason: String },

    #[error("feature vector shape error for {model}: expected width {expected}, got {actual}")]
    FeatureVectorShapeError {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("pipeline has not been fitted")]
    NotFitted,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("inference failed for {model}: {reason}")]
    Inference { model: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Short machine-readable name of the error kind, used for metrics and
    /// error replies.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SchemaMismatch { .. } => "schema_mismatch",
            PipelineError::DimensionMismatch { .. } => "dimension_mismatch",
            PipelineError::IncompatiblePipelineVersion { .. } => "incompatible_pipeline_version",
            PipelineError::ModelUnavailable { .. } => "model_unavailable",
            PipelineError::FeatureVectorShapeError { .. } => "feature_vector_shape",
            PipelineError::NotFitted => "not_fitted",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::Inference { .. } => "inference",
            PipelineError::Serialization(_) => "serialization",
            PipelineError::Io(_) => "io",
        }
    }

    pub(crate) fn missing(field: &str) -> Self {
        PipelineError::SchemaMismatch {
            field: field.to_string(),
        }
    }

    pub(crate) fn inference(model: &str, reason: impl ToString) -> Self {
        PipelineError::Inference {
            model: model.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(PipelineError::missing("age").kind(), "schema_mismatch");
        assert_eq!(PipelineError::NotFitted.kind(), "not_fitted");
        assert_eq!(
            PipelineError::FeatureVectorShapeError {
                model: "xgboost".to_string(),
                expected: 90,
                actual: 89,
            }
            .kind(),
            "feature_vector_shape"
        );
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::missing("income");
        assert_eq!(
            err.to_string(),
            "schema mismatch: required field `income` is missing"
        );
    }
}
