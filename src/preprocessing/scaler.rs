//! Standard scaling of encoded feature vectors

use crate::error::{PipelineError, Result};
use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Lower bound applied to every fitted scale. Constant columns would
/// otherwise divide by zero.
pub const MIN_SCALE: f64 = 1e-8;

/// Per-column mean and scale, in encoded column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParameters {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl NormalizationParameters {
    /// Number of columns the parameters were fitted on
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Check internal consistency and that the parameters cover `width` columns
    pub fn check_width(&self, width: usize) -> Result<()> {
        if self.scale.len() != self.mean.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.mean.len(),
                actual: self.scale.len(),
            });
        }
        if self.len() != width {
            return Err(PipelineError::DimensionMismatch {
                expected: width,
                actual: self.len(),
            });
        }
        Ok(())
    }

    /// Reject parameters no fit could have produced: non-finite values or a
    /// scale below the floor
    pub fn check_values(&self) -> Result<()> {
        for (column, (mean, scale)) in self.mean.iter().zip(&self.scale).enumerate() {
            if !mean.is_finite() || !scale.is_finite() || *scale < MIN_SCALE {
                return Err(PipelineError::InvalidInput(format!(
                    "column {} has mean {} and scale {}",
                    column, mean, scale
                )));
            }
        }
        Ok(())
    }
}

/// Z-score scaler: `(x - mean) / scale` with population standard deviation
#[derive(Debug, Clone, Copy)]
pub struct StandardScaler {
    min_scale: f64,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            min_scale: MIN_SCALE,
        }
    }

    /// Fit per-column parameters, one row per training sample
    pub fn fit(&self, matrix: ArrayView2<f64>) -> Result<NormalizationParameters> {
        let mean = matrix
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::InvalidInput("cannot fit scaler on zero rows".to_string()))?;
        let scale = matrix
            .std_axis(Axis(0), 0.0)
            .mapv(|std| std.max(self.min_scale));

        let params = NormalizationParameters {
            mean: mean.to_vec(),
            scale: scale.to_vec(),
        };
        params.check_values()?;
        Ok(params)
    }

    /// Scale one vector with fitted parameters
    pub fn transform(&self, vector: &[f64], params: &NormalizationParameters) -> Result<Vec<f64>> {
        if vector.len() != params.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: params.len(),
                actual: vector.len(),
            });
        }

        Ok(vector
            .iter()
            .zip(&params.mean)
            .zip(&params.scale)
            .map(|((x, mean), scale)| (x - mean) / scale)
            .collect())
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}
