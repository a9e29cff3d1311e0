//! Random over-sampling

use crate::error::{Result, TrainerError};
use crate::synthetic::{class_counts, class_indices, Sampler};
use ndarray::Array1;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Random oversampler (duplicates minority samples up to the majority count)
///
/// Original rows keep their positions; duplicates are appended after them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RandomOverSampler {
    /// Random seed
    seed: Option<u64>,
    /// Target counts
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl RandomOverSampler {
    /// Create new random oversampler
    pub fn new() -> Self {
        Self::default()
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Sampler for RandomOverSampler {
    fn fit(&mut self, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);
        let max_count = counts.values().copied().max().ok_or_else(|| {
            TrainerError::DataError("Cannot over-sample an empty dataset".to_string())
        })?;

        self.target_counts = Some(counts.keys().map(|&class| (class, max_count)).collect());
        Ok(())
    }

    fn resample(&self, y: &Array1<i64>) -> Result<Vec<usize>> {
        let targets = self.target_counts.as_ref().ok_or_else(|| {
            TrainerError::ValidationError("Sampler not fitted".to_string())
        })?;

        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let by_class = class_indices(y);
        let mut indices: Vec<usize> = (0..y.len()).collect();

        for (class, &target_count) in targets {
            let class_idx = match by_class.get(class) {
                Some(idx) if !idx.is_empty() => idx,
                _ => continue,
            };
            let n_to_add = target_count.saturating_sub(class_idx.len());

            for _ in 0..n_to_add {
                indices.push(class_idx[rng.gen_range(0..class_idx.len())]);
            }
        }

        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imbalanced_labels() -> Array1<i64> {
        (0..35).map(|i| if i < 30 { 0 } else { 1 }).collect()
    }

    #[test]
    fn test_random_oversampler() {
        let y = imbalanced_labels();

        let mut sampler = RandomOverSampler::new().with_seed(42);
        let indices = sampler.fit_resample(&y).unwrap();
        assert_eq!(indices.len(), 60);

        let resampled: Array1<i64> = indices.iter().map(|&i| y[i]).collect();
        let new_counts = class_counts(&resampled);
        assert_eq!(new_counts.get(&0), Some(&30));
        assert_eq!(new_counts.get(&1), Some(&30));

        // Originals first, duplicates point back at minority rows
        assert_eq!(&indices[..35], &(0..35).collect::<Vec<_>>()[..]);
        assert!(indices[35..].iter().all(|&i| i >= 30));
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let y = imbalanced_labels();
        let a = RandomOverSampler::new().with_seed(7).fit_resample(&y).unwrap();
        let b = RandomOverSampler::new().with_seed(7).fit_resample(&y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_balanced_input_unchanged() {
        let y = Array1::from_vec(vec![0, 1, 0, 1]);
        let indices = RandomOverSampler::new().with_seed(1).fit_resample(&y).unwrap();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_resample_unfitted() {
        let sampler = RandomOverSampler::new();
        assert!(sampler.resample(&Array1::from_vec(vec![0, 1])).is_err());
    }
}
