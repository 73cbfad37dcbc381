//! Type definitions for the loan default pipeline

pub mod application;
pub mod categories;
pub mod message;
pub mod prediction;

pub use application::LoanApplication;
pub use message::{ApiResponse, SyntheticRequest};
pub use prediction::PredictionResult;
