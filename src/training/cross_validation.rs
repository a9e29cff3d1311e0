//! Cross-validation splitters

use crate::error::{Result, TrainerError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl CVStrategy {
    /// Number of folds this strategy produces
    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => {
                *n_splits
            }
        }
    }
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 5, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                self.k_fold_split(n_samples, *n_splits, *shuffle)
            }
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    TrainerError::ValidationError(
                        "StratifiedKFold requires target array".to_string(),
                    )
                })?;
                self.stratified_k_fold_split(n_samples, y, *n_splits, *shuffle)
            }
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn check_fold_count(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(TrainerError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(TrainerError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_fold_count(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(
        &self,
        n_samples: usize,
        y: &Array1<f64>,
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        if y.len() != n_samples {
            return Err(TrainerError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }
        Self::check_fold_count(n_samples, n_splits)?;

        // Ordered by label so the assignment is reproducible
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if class_indices.len() < 2 {
            return Err(TrainerError::ValidationError(
                "StratifiedKFold requires at least two classes in the target".to_string(),
            ));
        }

        let least_populated = class_indices.values().map(Vec::len).min().unwrap_or(0);
        if least_populated < n_splits {
            warn!(
                least_populated,
                n_splits,
                "Least populated class has fewer members than n_splits"
            );
        }

        if shuffle {
            let mut rng = self.rng();
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal each class round robin; the cursor carries over between classes
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut cursor = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[cursor].push(idx);
                cursor = (cursor + 1) % n_splits;
            }
        }

        let mut splits = Vec::with_capacity(n_splits);
        for fold_idx in 0..n_splits {
            let mut test_indices = folds[fold_idx].clone();
            test_indices.sort_unstable();
            let mut train_indices: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            train_indices.sort_unstable();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
        }

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: f64::NAN,
                std_score: f64::NAN,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(splits: &[CVSplit], n: usize) {
        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..n).collect::<Vec<_>>());

        for split in splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), n);
            for idx in &split.test_indices {
                assert!(!split.train_indices.contains(idx));
            }
        }
    }

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        let splits = cv.split(100, None).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }
        // Unshuffled folds are contiguous blocks
        assert_eq!(splits[1].test_indices, (20..40).collect::<Vec<_>>());
        assert_partition(&splits, 100);
    }

    #[test]
    fn test_k_fold_uneven_sizes() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: true })
            .with_random_state(42);
        let splits = cv.split(103, None).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![21, 21, 21, 20, 20]);
        assert_partition(&splits, 103);
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 4, shuffle: true })
            .with_random_state(7);
        let a = cv.split(40, None).unwrap();
        let b = cv.split(40, None).unwrap();
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.test_indices, sb.test_indices);
        }
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, // 5 samples of class 0
            1.0, 1.0, 1.0, 1.0, 1.0, // 5 samples of class 1
        ]);

        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false });
        let splits = cv.split(10, Some(&y)).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 1);
        }
        assert_partition(&splits, 10);
    }

    #[test]
    fn test_stratified_preserves_ratio() {
        // 30% positives
        let y: Array1<f64> = (0..500).map(|i| if i % 10 < 3 { 1.0 } else { 0.0 }).collect();
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true })
            .with_random_state(42);
        let splits = cv.split(500, Some(&y)).unwrap();

        for split in &splits {
            let pos = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            let ratio = pos as f64 / split.test_indices.len() as f64;
            assert!((ratio - 0.3).abs() < 0.05, "fold ratio {}", ratio);
        }
        assert_partition(&splits, 500);
    }

    #[test]
    fn test_stratified_fold_sizes_balanced() {
        // 7 + 6 samples: a per-class reset would overfill the first folds
        let y: Array1<f64> = (0..13).map(|i| if i < 7 { 0.0 } else { 1.0 }).collect();
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false });
        let splits = cv.split(13, Some(&y)).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[test]
    fn test_invalid_requests() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        assert!(cv.split(3, None).is_err());

        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 1, shuffle: false });
        assert!(cv.split(10, None).is_err());

        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 2, shuffle: false });
        assert!(cv.split(4, None).is_err());

        let single = Array1::from_elem(10, 1.0);
        assert!(matches!(
            cv.split(10, Some(&single)),
            Err(TrainerError::ValidationError(_))
        ));
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.8, 0.9, 1.0]);
        assert_eq!(results.n_folds, 3);
        assert!((results.mean_score - 0.9).abs() < 1e-12);
        assert!(results.std_score > 0.0);
    }
}
