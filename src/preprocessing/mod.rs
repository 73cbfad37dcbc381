//! Feature preprocessing: one-hot encoding, scaling and persistence

pub mod encoder;
pub mod oversample;
pub mod pipeline;
pub mod scaler;

pub use encoder::{FeatureEncoder, FeatureSource, FittedVocabulary};
pub use oversample::Smote;
pub use pipeline::{PreprocessingPipeline, PIPELINE_FORMAT, PIPELINE_VERSION};
pub use scaler::{NormalizationParameters, StandardScaler};
