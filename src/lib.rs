//! Loan Default Pipeline Library
//!
//! Turns a loan application into a fixed-width feature vector (one-hot
//! categories plus standardized numerics) and scores it with a three-model
//! majority-vote ensemble. Also generates synthetic applications for demos
//! and load tests.

pub mod config;
pub mod consumer;
pub mod error;
pub mod metrics;
pub mod models;
pub mod preprocessing;
pub mod producer;
pub mod service;
pub mod synthetic;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{PipelineError, Result};
pub use models::{EnsemblePredictor, RiskModel};
pub use preprocessing::PreprocessingPipeline;
pub use producer::ReplyPublisher;
pub use service::RiskService;
pub use synthetic::SyntheticGenerator;
pub use types::{LoanApplication, PredictionResult};
