//! Synthetic loan applications for demos and load testing

use crate::error::{PipelineError, Result};
use crate::types::categories::{
    CAR_OWNERSHIP, HOME_OWNERSHIP, LEGACY_HOME_OWNERSHIP, PROFESSIONS, STATES,
};
use crate::types::LoanApplication;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Mutex;
use tracing::{debug, info};

/// Generator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Draw home ownership from `OWN`/`RENT`/`MORTGAGE` instead of the
    /// training vocabulary. Those values encode to an all-zero block.
    #[serde(default)]
    pub legacy_home_ownership: bool,
    /// Fixed seed for reproducible output; entropy-seeded when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Value ranges for one applicant profile. All ranges are half-open.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub age: Range<u32>,
    pub income: Range<f64>,
    pub experience: Range<u32>,
    pub current_job_years: Range<u32>,
    pub current_house_years: Range<u32>,
}

impl Profile {
    /// Young, low-experience applicants
    pub fn likely_defaulter() -> Self {
        Self {
            age: 18..36,
            income: 25_000.0..150_000.0,
            experience: 0..3,
            current_job_years: 0..50,
            current_house_years: 0..50,
        }
    }

    /// Older, experienced applicants with a higher income floor
    pub fn likely_non_defaulter() -> Self {
        Self {
            age: 30..70,
            income: 37_500.0..150_000.0,
            experience: 5..50,
            current_job_years: 0..50,
            current_house_years: 0..50,
        }
    }
}

/// Application tagged with the profile it was drawn from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledApplication {
    #[serde(flatten)]
    pub application: LoanApplication,
    pub likely_default: bool,
}

/// Split `count` into (defaulters, non-defaulters)
pub fn split_counts(count: usize, default_ratio: f64) -> (usize, usize) {
    let defaulters = ((count as f64 * default_ratio).floor() as usize).min(count);
    (defaulters, count - defaulters)
}

pub struct SyntheticGenerator {
    config: SyntheticConfig,
    defaulter: Profile,
    non_defaulter: Profile,
    seeded: Option<Mutex<StdRng>>,
}

impl SyntheticGenerator {
    pub fn new(config: SyntheticConfig) -> Self {
        let seeded = config.seed.map(|seed| Mutex::new(StdRng::seed_from_u64(seed)));
        Self {
            config,
            defaulter: Profile::likely_defaulter(),
            non_defaulter: Profile::likely_non_defaulter(),
            seeded,
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Generate `count` applications, `floor(count * default_ratio)` of them
    /// from the defaulter profile, in shuffled order
    pub fn generate(&self, count: usize, default_ratio: f64) -> Result<Vec<LoanApplication>> {
        Ok(self
            .generate_labelled(count, default_ratio)?
            .into_iter()
            .map(|labelled| labelled.application)
            .collect())
    }

    /// Like [`generate`](Self::generate), keeping the profile label
    pub fn generate_labelled(
        &self,
        count: usize,
        default_ratio: f64,
    ) -> Result<Vec<LabelledApplication>> {
        match &self.seeded {
            Some(rng) => {
                let mut rng = rng.lock().map_err(|e| {
                    PipelineError::InvalidInput(format!("generator lock poisoned: {}", e))
                })?;
                self.generate_labelled_with_rng(count, default_ratio, &mut *rng)
            }
            None => self.generate_labelled_with_rng(count, default_ratio, &mut thread_rng()),
        }
    }

    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        count: usize,
        default_ratio: f64,
        rng: &mut R,
    ) -> Result<Vec<LoanApplication>> {
        Ok(self
            .generate_labelled_with_rng(count, default_ratio, rng)?
            .into_iter()
            .map(|labelled| labelled.application)
            .collect())
    }

    pub fn generate_labelled_with_rng<R: Rng + ?Sized>(
        &self,
        count: usize,
        default_ratio: f64,
        rng: &mut R,
    ) -> Result<Vec<LabelledApplication>> {
        if !(0.0..=1.0).contains(&default_ratio) {
            return Err(PipelineError::InvalidInput(format!(
                "default_ratio must be in [0, 1], got {}",
                default_ratio
            )));
        }

        let (defaulters, non_defaulters) = split_counts(count, default_ratio);
        info!(
            count = count,
            defaulters = defaulters,
            non_defaulters = non_defaulters,
            legacy_home_ownership = self.config.legacy_home_ownership,
            "Generating synthetic applications"
        );

        let mut records = Vec::with_capacity(count);
        for _ in 0..defaulters {
            records.push(LabelledApplication {
                application: self.sample(&self.defaulter, rng),
                likely_default: true,
            });
        }
        for _ in 0..non_defaulters {
            records.push(LabelledApplication {
                application: self.sample(&self.non_defaulter, rng),
                likely_default: false,
            });
        }
        records.shuffle(rng);

        Ok(records)
    }

    fn sample<R: Rng + ?Sized>(&self, profile: &Profile, rng: &mut R) -> LoanApplication {
        let home_ownership = if self.config.legacy_home_ownership {
            LEGACY_HOME_OWNERSHIP
        } else {
            HOME_OWNERSHIP
        };

        let application = LoanApplication {
            age: rng.gen_range(profile.age.clone()),
            income: rng.gen_range(profile.income.clone()),
            experience: rng.gen_range(profile.experience.clone()) as f64,
            current_job_years: rng.gen_range(profile.current_job_years.clone()) as f64,
            current_house_years: rng.gen_range(profile.current_house_years.clone()) as f64,
            home_ownership: pick(home_ownership, rng),
            car_ownership: pick(CAR_OWNERSHIP, rng),
            profession: pick(PROFESSIONS, rng),
            state: pick(STATES, rng),
        };

        debug!(
            age = application.age,
            income = application.income,
            experience = application.experience,
            profession = %application.profession,
            "Sampled application"
        );
        application
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

fn pick<R: Rng + ?Sized>(values: &[&str], rng: &mut R) -> String {
    values.choose(rng).copied().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FeatureEncoder;

    #[test]
    fn test_split_counts() {
        assert_eq!(split_counts(10, 0.3), (3, 7));
        assert_eq!(split_counts(1, 0.3), (0, 1));
        assert_eq!(split_counts(7, 0.5), (3, 4));
        assert_eq!(split_counts(100, 1.0), (100, 0));
        assert_eq!(split_counts(5, 0.0), (0, 5));
    }

    #[test]
    fn test_profiles_respected() {
        let generator = SyntheticGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);
        let records = generator
            .generate_labelled_with_rng(10, 0.3, &mut rng)
            .unwrap();

        assert_eq!(records.len(), 10);
        assert_eq!(records.iter().filter(|r| r.likely_default).count(), 3);

        for record in &records {
            let app = &record.application;
            let profile = if record.likely_default {
                Profile::likely_defaulter()
            } else {
                Profile::likely_non_defaulter()
            };
            assert!(profile.age.contains(&app.age));
            assert!(profile.income.contains(&app.income));
            assert!(profile.experience.contains(&(app.experience as u32)));
            assert!(app.current_job_years < 50.0);
            assert!(app.current_house_years < 50.0);
            assert!(HOME_OWNERSHIP.contains(&app.home_ownership.as_str()));
            assert!(PROFESSIONS.contains(&app.profession.as_str()));
            assert!(STATES.contains(&app.state.as_str()));
            assert!(app.validate().is_ok());
        }
    }

    #[test]
    fn test_seeded_output_reproducible() {
        let generator = SyntheticGenerator::default();
        let first = generator
            .generate_with_rng(20, 0.4, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let second = generator
            .generate_with_rng(20, 0.4, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(first, second);

        let config = SyntheticConfig {
            seed: Some(3),
            ..Default::default()
        };
        let a = SyntheticGenerator::new(config.clone()).generate(5, 0.3).unwrap();
        let b = SyntheticGenerator::new(config).generate(5, 0.3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ratio_out_of_range() {
        let generator = SyntheticGenerator::default();
        assert!(generator.generate(10, 1.5).is_err());
        assert!(generator.generate(10, -0.1).is_err());
    }

    #[test]
    fn test_legacy_home_ownership_encodes_to_zero_block() {
        let generator = SyntheticGenerator::new(SyntheticConfig {
            legacy_home_ownership: true,
            seed: Some(11),
        });
        let legacy = generator.generate(10, 0.3).unwrap();
        assert!(legacy
            .iter()
            .all(|app| LEGACY_HOME_OWNERSHIP.contains(&app.home_ownership.as_str())));

        // fit on the training vocabulary only
        let training = SyntheticGenerator::default()
            .generate_with_rng(60, 0.5, &mut StdRng::seed_from_u64(1))
            .unwrap();
        let encoder = FeatureEncoder::new();
        let vocabulary = encoder.fit(&training).unwrap();

        for app in &legacy {
            let encoded = encoder.encode(app, &vocabulary).unwrap();
            for category in HOME_OWNERSHIP {
                if let Some(column) = vocabulary.column_of("house_ownership", category) {
                    assert_eq!(encoded[column], 0.0);
                }
            }
        }
    }
}
