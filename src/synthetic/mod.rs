//! Class rebalancing by random over-sampling

mod random_sampling;

pub use random_sampling::RandomOverSampler;

use crate::error::Result;
use ndarray::Array1;
use std::collections::BTreeMap;

/// Trait for samplers
///
/// Samplers work on row indices: the output lists the source row of every
/// resampled row, so callers can carry along any per-row data.
pub trait Sampler: Send + Sync {
    /// Fit the sampler on the labels
    fn fit(&mut self, y: &Array1<i64>) -> Result<()>;

    /// Source row of every output row
    fn resample(&self, y: &Array1<i64>) -> Result<Vec<usize>>;

    /// Fit and resample in one step
    fn fit_resample(&mut self, y: &Array1<i64>) -> Result<Vec<usize>> {
        self.fit(y)?;
        self.resample(y)
    }
}

/// Get class distribution
pub fn class_counts(y: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Get indices for each class
pub fn class_indices(y: &Array1<i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}
