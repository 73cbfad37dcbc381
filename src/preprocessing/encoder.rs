//! Categorical one-hot encoding with numeric passthrough.
//!
//! The fitted vocabulary fixes the column layout of every feature vector the
//! models see: one block per categorical feature (categories in byte order)
//! followed by the numeric features in declared order. The layout is resolved
//! once into a category -> column index map, so encoding is a sequence of
//! direct writes into a zeroed vector.

use crate::error::{PipelineError, Result};
use crate::types::LoanApplication;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Categorical features in column order
pub const CATEGORICAL_FEATURES: [&str; 4] =
    ["house_ownership", "profession", "state", "car_ownership"];

/// Numeric features in column order, appended after the categorical blocks
pub const NUMERIC_FEATURES: [&str; 5] = [
    "income",
    "age",
    "experience",
    "current_job_years",
    "current_house_years",
];

/// Anything the encoder can read feature values from.
///
/// Returning `None` means the field is absent, which the encoder reports as
/// a schema mismatch.
pub trait FeatureSource {
    fn numeric(&self, name: &str) -> Option<f64>;
    fn categorical(&self, name: &str) -> Option<&str>;
}

impl FeatureSource for LoanApplication {
    fn numeric(&self, name: &str) -> Option<f64> {
        match name {
            "income" => Some(self.income),
            "age" => Some(self.age as f64),
            "experience" => Some(self.experience),
            "current_job_years" => Some(self.current_job_years),
            "current_house_years" => Some(self.current_house_years),
            _ => None,
        }
    }

    fn categorical(&self, name: &str) -> Option<&str> {
        match name {
            "house_ownership" | "home_ownership" => Some(&self.home_ownership),
            "car_ownership" => Some(&self.car_ownership),
            "profession" => Some(&self.profession),
            "state" => Some(&self.state),
            _ => None,
        }
    }
}

/// Loosely typed record, e.g. one line of a training file. A value of the
/// wrong JSON type counts as absent.
impl FeatureSource for Map<String, Value> {
    fn numeric(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    fn categorical(&self, name: &str) -> Option<&str> {
        let value = match name {
            "house_ownership" => self.get(name).or_else(|| self.get("home_ownership")),
            _ => self.get(name),
        };
        value.and_then(Value::as_str)
    }
}

impl<T: FeatureSource + ?Sized> FeatureSource for &T {
    fn numeric(&self, name: &str) -> Option<f64> {
        (**self).numeric(name)
    }

    fn categorical(&self, name: &str) -> Option<&str> {
        (**self).categorical(name)
    }
}

/// Categories observed for one categorical feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBlock {
    pub feature: String,
    pub categories: Vec<String>,
}

/// Serialized shape of a vocabulary; the index map is derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VocabularyState {
    blocks: Vec<CategoryBlock>,
    numeric: Vec<String>,
}

/// Frozen column layout established by [`FeatureEncoder::fit`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "VocabularyState", into = "VocabularyState")]
pub struct FittedVocabulary {
    blocks: Vec<CategoryBlock>,
    numeric: Vec<String>,
    /// Per block: category -> absolute column index
    index: Vec<HashMap<String, usize>>,
    width: usize,
}

impl FittedVocabulary {
    /// Build a vocabulary from explicit blocks. Categories inside a block
    /// must be unique; their order is kept as given.
    pub fn new(blocks: Vec<CategoryBlock>, numeric: Vec<String>) -> Result<Self> {
        let mut index = Vec::with_capacity(blocks.len());
        let mut offset = 0usize;

        for block in &blocks {
            let mut columns = HashMap::with_capacity(block.categories.len());
            for category in &block.categories {
                if columns.insert(category.clone(), offset).is_some() {
                    return Err(PipelineError::InvalidInput(format!(
                        "duplicate category `{}` in feature `{}`",
                        category, block.feature
                    )));
                }
                offset += 1;
            }
            index.push(columns);
        }

        Ok(Self {
            width: offset + numeric.len(),
            blocks,
            numeric,
            index,
        })
    }

    /// Total encoded width: sum of category counts plus numeric features
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn blocks(&self) -> &[CategoryBlock] {
        &self.blocks
    }

    pub fn numeric_features(&self) -> &[String] {
        &self.numeric
    }

    /// Column index of `category` within `feature`'s block, if it was seen
    /// during fitting.
    pub fn column_of(&self, feature: &str, category: &str) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| b.feature == feature)
            .and_then(|i| self.index[i].get(category).copied())
    }

    /// Human-readable column names, aligned 1:1 with encoded vectors
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width);
        for block in &self.blocks {
            for category in &block.categories {
                names.push(format!("{}_{}", block.feature, category));
            }
        }
        names.extend(self.numeric.iter().cloned());
        names
    }
}

impl PartialEq for FittedVocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.blocks == other.blocks && self.numeric == other.numeric
    }
}

impl TryFrom<VocabularyState> for FittedVocabulary {
    type Error = PipelineError;

    fn try_from(state: VocabularyState) -> Result<Self> {
        Self::new(state.blocks, state.numeric)
    }
}

impl From<FittedVocabulary> for VocabularyState {
    fn from(vocabulary: FittedVocabulary) -> Self {
        Self {
            blocks: vocabulary.blocks,
            numeric: vocabulary.numeric,
        }
    }
}

/// One-hot encoder over a declared set of categorical and numeric features
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    categorical: Vec<String>,
    numeric: Vec<String>,
}

impl FeatureEncoder {
    /// Encoder for the loan application schema
    pub fn new() -> Self {
        Self::with_features(&CATEGORICAL_FEATURES, &NUMERIC_FEATURES)
    }

    /// Encoder for an explicit feature list. Order is preserved in the output.
    pub fn with_features(categorical: &[&str], numeric: &[&str]) -> Self {
        Self {
            categorical: categorical.iter().map(|s| s.to_string()).collect(),
            numeric: numeric.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Record every category seen per categorical feature.
    ///
    /// Every record must carry every declared field.
    pub fn fit<S: FeatureSource>(&self, records: &[S]) -> Result<FittedVocabulary> {
        if records.is_empty() {
            return Err(PipelineError::InvalidInput(
                "cannot fit encoder on zero records".to_string(),
            ));
        }

        let mut seen: Vec<BTreeSet<String>> = vec![BTreeSet::new(); self.categorical.len()];

        for record in records {
            for name in &self.numeric {
                record
                    .numeric(name)
                    .ok_or_else(|| PipelineError::missing(name))?;
            }
            for (feature, categories) in self.categorical.iter().zip(seen.iter_mut()) {
                let value = record
                    .categorical(feature)
                    .ok_or_else(|| PipelineError::missing(feature))?;
                if !categories.contains(value) {
                    categories.insert(value.to_string());
                }
            }
        }

        let blocks = self
            .categorical
            .iter()
            .zip(seen)
            .map(|(feature, categories)| CategoryBlock {
                feature: feature.clone(),
                categories: categories.into_iter().collect(),
            })
            .collect();

        FittedVocabulary::new(blocks, self.numeric.clone())
    }

    /// Encode one record against a fitted vocabulary.
    ///
    /// A category that was not seen during fitting leaves its block all
    /// zero. A missing field fails before anything is written.
    pub fn encode<S: FeatureSource>(
        &self,
        record: &S,
        vocabulary: &FittedVocabulary,
    ) -> Result<Vec<f64>> {
        let mut hot = Vec::with_capacity(vocabulary.blocks.len());
        for (block, columns) in vocabulary.blocks.iter().zip(&vocabulary.index) {
            let value = record
                .categorical(&block.feature)
                .ok_or_else(|| PipelineError::missing(&block.feature))?;
            hot.push(columns.get(value).copied());
        }

        let mut numeric = Vec::with_capacity(vocabulary.numeric.len());
        for name in &vocabulary.numeric {
            numeric.push(
                record
                    .numeric(name)
                    .ok_or_else(|| PipelineError::missing(name))?,
            );
        }

        let mut vector = vec![0.0; vocabulary.width];
        for column in hot.into_iter().flatten() {
            vector[column] = 1.0;
        }
        let numeric_offset = vocabulary.width - vocabulary.numeric.len();
        vector[numeric_offset..].copy_from_slice(&numeric);

        Ok(vector)
    }
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}
