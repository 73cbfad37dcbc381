//! Encoder + scaler composition with versioned persistence

use crate::error::{PipelineError, Result};
use crate::preprocessing::encoder::{FeatureEncoder, FeatureSource, FittedVocabulary};
use crate::preprocessing::oversample::Smote;
use crate::preprocessing::scaler::{NormalizationParameters, StandardScaler};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Format tag written into every persisted pipeline
pub const PIPELINE_FORMAT: &str = "loan-default-pipeline";

/// Bump whenever the encoder layout or blob shape changes
pub const PIPELINE_VERSION: u32 = 1;

/// Fitted state: column layout plus normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedState {
    pub vocabulary: FittedVocabulary,
    pub normalization: NormalizationParameters,
    pub fitted_at: DateTime<Utc>,
}

/// Only the tag fields, parsed before trusting the rest of the blob
#[derive(Deserialize)]
struct BlobHeader {
    format: Option<String>,
    version: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct PipelineBlob {
    format: String,
    version: u32,
    state: FittedState,
}

/// Raw application -> scaled model input
#[derive(Debug, Clone, Default)]
pub struct PreprocessingPipeline {
    encoder: FeatureEncoder,
    scaler: StandardScaler,
    state: Option<FittedState>,
}

impl PreprocessingPipeline {
    /// Unfitted pipeline for the loan application schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Unfitted pipeline with a custom encoder
    pub fn with_encoder(encoder: FeatureEncoder) -> Self {
        Self {
            encoder,
            ..Self::default()
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&FittedState> {
        self.state.as_ref()
    }

    fn fitted(&self) -> Result<&FittedState> {
        self.state.as_ref().ok_or(PipelineError::NotFitted)
    }

    /// Encoded vector width
    pub fn width(&self) -> Result<usize> {
        Ok(self.fitted()?.vocabulary.width())
    }

    /// Column names aligned with the output vector
    pub fn feature_names(&self) -> Result<Vec<String>> {
        Ok(self.fitted()?.vocabulary.column_names())
    }

    /// Fit the vocabulary and normalization on training rows.
    ///
    /// Labels are only checked for alignment with the rows. On error the
    /// previous state is left untouched.
    pub fn fit<S: FeatureSource>(&mut self, rows: &[S], labels: &[u8]) -> Result<()> {
        if rows.len() != labels.len() {
            return Err(PipelineError::InvalidInput(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }

        let vocabulary = self.encoder.fit(rows)?;
        let encoded = rows
            .iter()
            .map(|row| self.encoder.encode(row, &vocabulary))
            .collect::<Result<Vec<_>>>()?;
        let normalization = self
            .scaler
            .fit(to_matrix(encoded, vocabulary.width())?.view())?;

        info!(
            rows = rows.len(),
            width = vocabulary.width(),
            "Preprocessing pipeline fitted"
        );

        self.state = Some(FittedState {
            vocabulary,
            normalization,
            fitted_at: Utc::now(),
        });
        Ok(())
    }

    fn transform_scaled<S: FeatureSource>(&self, row: &S) -> Result<Vec<f64>> {
        let state = self.fitted()?;
        let encoded = self.encoder.encode(row, &state.vocabulary)?;
        self.scaler.transform(&encoded, &state.normalization)
    }

    /// Encode and scale one row into a model input vector
    pub fn transform<S: FeatureSource>(&self, row: &S) -> Result<Vec<f32>> {
        Ok(to_f32(self.transform_scaled(row)?))
    }

    /// Encode and scale many rows; fails on the first bad row
    pub fn transform_batch<S: FeatureSource>(&self, rows: &[S]) -> Result<Vec<Vec<f32>>> {
        rows.iter().map(|row| self.transform(row)).collect()
    }

    pub fn fit_transform<S: FeatureSource>(
        &mut self,
        rows: &[S],
        labels: &[u8],
    ) -> Result<Vec<Vec<f32>>> {
        self.fit(rows, labels)?;
        self.transform_batch(rows)
    }

    /// Fit, transform, then oversample the minority class. Training only.
    pub fn fit_transform_resampled<S: FeatureSource>(
        &mut self,
        rows: &[S],
        labels: &[u8],
        smote: &Smote,
    ) -> Result<(Vec<Vec<f32>>, Vec<u8>)> {
        self.fit(rows, labels)?;
        let scaled = rows
            .iter()
            .map(|row| self.transform_scaled(row))
            .collect::<Result<Vec<_>>>()?;

        let scaled = to_matrix(scaled, self.width()?)?;

        let (resampled, resampled_labels) = smote.fit_resample(scaled.view(), labels)?;
        debug!(
            before = scaled.nrows(),
            after = resampled.nrows(),
            "Applied SMOTE oversampling"
        );

        let rows = resampled
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|&v| v as f32).collect())
            .collect();
        Ok((rows, resampled_labels))
    }

    /// Serialize the fitted state into a versioned blob
    pub fn save(&self) -> Result<Vec<u8>> {
        let blob = PipelineBlob {
            format: PIPELINE_FORMAT.to_string(),
            version: PIPELINE_VERSION,
            state: self.fitted()?.clone(),
        };
        Ok(serde_json::to_vec_pretty(&blob)?)
    }

    /// Restore a pipeline from a blob written by [`save`](Self::save).
    ///
    /// The format tag and version are checked before the body is decoded.
    pub fn load(blob: &[u8]) -> Result<Self> {
        let header: BlobHeader = serde_json::from_slice(blob)?;
        let expected = format!("{} v{}", PIPELINE_FORMAT, PIPELINE_VERSION);
        match (header.format.as_deref(), header.version) {
            (Some(PIPELINE_FORMAT), Some(PIPELINE_VERSION)) => {}
            (format, version) => {
                return Err(PipelineError::IncompatiblePipelineVersion {
                    expected,
                    found: format!(
                        "{} v{}",
                        format.unwrap_or("<untagged>"),
                        version.map_or_else(|| "?".to_string(), |v| v.to_string())
                    ),
                });
            }
        }

        let blob: PipelineBlob = serde_json::from_slice(blob)?;
        let normalization = &blob.state.normalization;
        normalization.check_width(blob.state.vocabulary.width())?;
        normalization.check_values()?;

        Ok(Self {
            state: Some(blob.state),
            ..Self::default()
        })
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.save()?)?;
        info!(path = %path.as_ref().display(), "Saved preprocessing pipeline");
        Ok(())
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let pipeline = Self::load(&bytes)?;
        info!(
            path = %path.as_ref().display(),
            width = pipeline.width()?,
            "Loaded preprocessing pipeline"
        );
        Ok(pipeline)
    }
}

/// Stack equal-width encoded rows into a matrix
fn to_matrix(rows: Vec<Vec<f64>>, width: usize) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    let mut values = Vec::with_capacity(n_rows * width);
    for row in rows {
        if row.len() != width {
            return Err(PipelineError::DimensionMismatch {
                expected: width,
                actual: row.len(),
            });
        }
        values.extend(row);
    }

    Array2::from_shape_vec((n_rows, width), values)
        .map_err(|e| PipelineError::InvalidInput(e.to_string()))
}

fn to_f32(vector: Vec<f64>) -> Vec<f32> {
    vector.into_iter().map(|v| v as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::scaler::MIN_SCALE;
    use crate::types::LoanApplication;

    fn app(home: &str, profession: &str, state: &str, car: &str, income: f64) -> LoanApplication {
        LoanApplication {
            age: 30,
            income,
            experience: 6.0,
            current_job_years: 3.0,
            current_house_years: 11.0,
            home_ownership: home.to_string(),
            car_ownership: car.to_string(),
            profession: profession.to_string(),
            state: state.to_string(),
        }
    }

    fn fitted() -> PreprocessingPipeline {
        let rows = vec![
            app("rented", "Chef", "kerala", "no", 40000.0),
            app("owned", "Analyst", "delhi", "yes", 90000.0),
            app("norent_noown", "Chef", "bihar", "no", 65000.0),
            app("rented", "Surgeon", "delhi", "yes", 120000.0),
        ];
        let mut pipeline = PreprocessingPipeline::new();
        pipeline.fit(&rows, &[0, 0, 1, 0]).unwrap();
        pipeline
    }

    #[test]
    fn test_unfitted_pipeline() {
        let pipeline = PreprocessingPipeline::new();
        let row = app("rented", "Chef", "kerala", "no", 1.0);
        assert!(matches!(pipeline.transform(&row), Err(PipelineError::NotFitted)));
        assert!(matches!(pipeline.save(), Err(PipelineError::NotFitted)));
    }

    #[test]
    fn test_transform_width() {
        let pipeline = fitted();
        // 3 + 3 + 3 + 2 categories, 5 numeric
        assert_eq!(pipeline.width().unwrap(), 16);

        let row = app("owned", "Chef", "kerala", "yes", 50000.0);
        assert_eq!(pipeline.transform(&row).unwrap().len(), 16);
        assert_eq!(pipeline.feature_names().unwrap().len(), 16);
    }

    #[test]
    fn test_label_length_checked() {
        let mut pipeline = PreprocessingPipeline::new();
        let rows = vec![app("owned", "Chef", "kerala", "yes", 1.0)];
        assert!(pipeline.fit(&rows, &[]).is_err());
        assert!(!pipeline.is_fitted());
    }

    #[test]
    fn test_round_trip() {
        let pipeline = fitted();
        let restored = PreprocessingPipeline::load(&pipeline.save().unwrap()).unwrap();

        assert_eq!(restored.state(), pipeline.state());
        let row = app("rented", "Surgeon", "bihar", "no", 77000.0);
        assert_eq!(
            restored.transform(&row).unwrap(),
            pipeline.transform(&row).unwrap()
        );
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let blob = fitted().save().unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
        value["version"] = serde_json::json!(PIPELINE_VERSION + 1);
        let tampered = serde_json::to_vec(&value).unwrap();

        assert!(matches!(
            PreprocessingPipeline::load(&tampered),
            Err(PipelineError::IncompatiblePipelineVersion { .. })
        ));
    }

    #[test]
    fn test_untagged_blob_rejected() {
        let err = PreprocessingPipeline::load(br#"{"state": {}}"#).unwrap_err();
        match err {
            PipelineError::IncompatiblePipelineVersion { found, .. } => {
                assert_eq!(found, "<untagged> v?")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parameter_count_checked_on_load() {
        let blob = fitted().save().unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
        value["state"]["normalization"]["mean"]
            .as_array_mut()
            .unwrap()
            .pop();
        value["state"]["normalization"]["scale"]
            .as_array_mut()
            .unwrap()
            .pop();
        let tampered = serde_json::to_vec(&value).unwrap();

        assert!(matches!(
            PreprocessingPipeline::load(&tampered),
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_degenerate_scale_rejected_on_load() {
        let blob = fitted().save().unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
        value["state"]["normalization"]["scale"][0] = serde_json::json!(0.0);
        let tampered = serde_json::to_vec(&value).unwrap();

        assert!(matches!(
            PreprocessingPipeline::load(&tampered),
            Err(PipelineError::InvalidInput(_))
        ));

        value["state"]["normalization"]["scale"][0] = serde_json::json!(MIN_SCALE / 2.0);
        let tampered = serde_json::to_vec(&value).unwrap();
        assert!(PreprocessingPipeline::load(&tampered).is_err());
    }

    #[test]
    fn test_to_matrix_rejects_ragged_rows() {
        let matrix = to_matrix(vec![vec![1.0, 2.0], vec![3.0, 4.0]], 2).unwrap();
        assert_eq!(matrix.shape(), &[2, 2]);
        assert_eq!(matrix[[1, 0]], 3.0);

        assert!(matches!(
            to_matrix(vec![vec![1.0, 2.0], vec![3.0]], 2),
            Err(PipelineError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_fit_transform_resampled() {
        let mut pipeline = PreprocessingPipeline::new();
        let rows = vec![
            app("rented", "Chef", "kerala", "no", 40000.0),
            app("owned", "Analyst", "delhi", "yes", 90000.0),
            app("owned", "Chef", "bihar", "no", 65000.0),
            app("rented", "Surgeon", "delhi", "yes", 120000.0),
            app("rented", "Surgeon", "bihar", "yes", 30000.0),
        ];
        let (matrix, labels) = pipeline
            .fit_transform_resampled(&rows, &[1, 0, 0, 1, 0], &Smote::new())
            .unwrap();

        assert_eq!(matrix.len(), 6);
        assert_eq!(labels.iter().filter(|&&l| l == 1).count(), 3);
        assert!(matrix.iter().all(|row| row.len() == pipeline.width().unwrap()));
    }
}
