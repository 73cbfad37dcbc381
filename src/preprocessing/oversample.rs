//! SMOTE minority oversampling for offline training sets.
//!
//! Never used on the serving path.

use crate::error::{PipelineError, Result};
use ndarray::{concatenate, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

/// Synthetic Minority Over-sampling Technique for binary labels
#[derive(Debug, Clone)]
pub struct Smote {
    k_neighbors: usize,
    seed: u64,
}

impl Smote {
    /// Five neighbors, seed 2
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: 2,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Positions (into `minority`) of the k nearest neighbors of `minority[i]`
    fn neighbors(x: ArrayView2<f64>, minority: &[usize], i: usize, k: usize) -> Vec<usize> {
        let point = x.row(minority[i]);
        let mut distances: Vec<(f64, usize)> = minority
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, &row)| (Self::distance(point, x.row(row)), j))
            .collect();
        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        distances.into_iter().take(k).map(|(_, j)| j).collect()
    }

    /// Append synthetic minority rows until both classes have equal counts.
    ///
    /// Original rows come first, in their original order.
    pub fn fit_resample(&self, x: ArrayView2<f64>, y: &[u8]) -> Result<(Array2<f64>, Vec<u8>)> {
        if x.nrows() != y.len() {
            return Err(PipelineError::InvalidInput(format!(
                "{} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let positives = y.iter().filter(|&&label| label == 1).count();
        let negatives = y.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(PipelineError::InvalidInput(
                "SMOTE needs both classes present".to_string(),
            ));
        }

        let mut labels = y.to_vec();
        if positives == negatives {
            return Ok((x.to_owned(), labels));
        }

        let minority_label = if positives < negatives { 1 } else { 0 };
        let needed = positives.abs_diff(negatives);
        let minority: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == minority_label)
            .map(|(i, _)| i)
            .collect();

        if minority.len() < 2 {
            return Err(PipelineError::InvalidInput(
                "SMOTE needs at least two minority samples".to_string(),
            ));
        }

        let k = self.k_neighbors.min(minority.len() - 1);
        let neighbor_table: Vec<Vec<usize>> = (0..minority.len())
            .map(|i| Self::neighbors(x, &minority, i, k))
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut synthetic = Array2::<f64>::zeros((needed, x.ncols()));
        for mut sample in synthetic.rows_mut() {
            let i = rng.gen_range(0..minority.len());
            let j = neighbor_table[i][rng.gen_range(0..neighbor_table[i].len())];
            let gap: f64 = rng.gen();

            let point = x.row(minority[i]);
            let neighbor = x.row(minority[j]);
            sample.assign(&(&point + &((&neighbor - &point) * gap)));
            labels.push(minority_label);
        }

        let rows = concatenate(Axis(0), &[x.view(), synthetic.view()])
            .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
        Ok((rows, labels))
    }
}

impl Default for Smote {
    fn default() -> Self {
        Self::new()
    }
}
