//! Request and reply payloads exchanged over the message bus

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest batch a synthetic request may ask for
pub const MAX_SYNTHETIC_COUNT: usize = 100;

fn default_count() -> usize {
    1
}

fn default_ratio() -> f64 {
    0.3
}

/// Request for synthetic applications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticRequest {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_ratio")]
    pub default_ratio: f64,
}

impl SyntheticRequest {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 || self.count > MAX_SYNTHETIC_COUNT {
            return Err(PipelineError::InvalidInput(format!(
                "count must be in 1..={}, got {}",
                MAX_SYNTHETIC_COUNT, self.count
            )));
        }
        if !(0.0..=1.0).contains(&self.default_ratio) {
            return Err(PipelineError::InvalidInput(format!(
                "default_ratio must be in [0, 1], got {}",
                self.default_ratio
            )));
        }
        Ok(())
    }
}

impl Default for SyntheticRequest {
    fn default() -> Self {
        Self {
            count: default_count(),
            default_ratio: default_ratio(),
        }
    }
}

/// Error detail carried by a failed reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

/// Reply envelope for every request subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Unique reply identifier
    pub request_id: String,
    /// Reply timestamp
    pub timestamp: DateTime<Utc>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(kind: &str, message: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            ok: false,
            data: None,
            error: Some(ErrorBody {
                kind: kind.to_string(),
                message: message.into(),
            }),
        }
    }

    pub fn from_error(error: &PipelineError) -> Self {
        Self::failure(error.kind(), error.to_string())
    }
}

impl<T> From<Result<T>> for ApiResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::from_error(&e),
        }
    }
}
