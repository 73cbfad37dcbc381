//! Loan application record scored by the pipeline

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Youngest applicant the scoring schema accepts
pub const MIN_AGE: u32 = 18;
/// Oldest applicant the scoring schema accepts
pub const MAX_AGE: u32 = 100;

/// One risk-scoring request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    /// Age in years
    pub age: u32,

    /// Annual income
    pub income: f64,

    /// Total working experience in years
    pub experience: f64,

    /// Years in the current job
    pub current_job_years: f64,

    /// Years at the current residence
    pub current_house_years: f64,

    /// Home ownership class (`rented`, `owned`, `norent_noown`)
    #[serde(alias = "house_ownership")]
    pub home_ownership: String,

    /// Car ownership flag (`yes` / `no`)
    pub car_ownership: String,

    /// Profession
    pub profession: String,

    /// State or region
    pub state: String,
}

impl LoanApplication {
    /// Check the numeric invariants: every numeric field is finite and
    /// non-negative and the age lies within the accepted range.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(PipelineError::InvalidInput(format!(
                "age {} outside {}..={}",
                self.age, MIN_AGE, MAX_AGE
            )));
        }

        let numeric = [
            ("income", self.income),
            ("experience", self.experience),
            ("current_job_years", self.current_job_years),
            ("current_house_years", self.current_house_years),
        ];
        for (name, value) in numeric {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidInput(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}
