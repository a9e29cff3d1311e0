//! Feature selection algorithms
//!
//! - Variance threshold selection
//! - Correlation-based redundancy removal

use crate::error::Result;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Feature selection method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SelectionMethod {
    /// Remove features with variance at or below threshold
    VarianceThreshold { threshold: f64 },
    /// Remove one feature of every pair whose |pearson r| exceeds threshold
    CorrelationThreshold { threshold: f64 },
}

/// Unsupervised feature selector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    method: SelectionMethod,
    selected_features: Option<Vec<usize>>,
    /// (kept, dropped, r) for correlation removals
    removed_pairs: Vec<(usize, usize, f64)>,
}

impl FeatureSelector {
    /// Create a new feature selector with the given method
    pub fn new(method: SelectionMethod) -> Self {
        Self {
            method,
            selected_features: None,
            removed_pairs: Vec::new(),
        }
    }

    /// Create variance threshold selector
    pub fn variance_threshold(threshold: f64) -> Self {
        Self::new(SelectionMethod::VarianceThreshold { threshold })
    }

    /// Create correlation threshold selector
    pub fn correlation_threshold(threshold: f64) -> Self {
        Self::new(SelectionMethod::CorrelationThreshold {
            threshold: threshold.abs(),
        })
    }

    /// Fit the selector to data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        match self.method {
            SelectionMethod::VarianceThreshold { threshold } => self.fit_variance_threshold(x, threshold),
            SelectionMethod::CorrelationThreshold { threshold } => self.fit_correlation_threshold(x, threshold),
        }
        Ok(())
    }

    /// Get selected feature indices
    pub fn selected_indices(&self) -> Option<&[usize]> {
        self.selected_features.as_deref()
    }

    /// Correlated pairs found by the last fit, as (kept, dropped, r)
    pub fn removed_pairs(&self) -> &[(usize, usize, f64)] {
        &self.removed_pairs
    }

    fn fit_variance_threshold(&mut self, x: &Array2<f64>, threshold: f64) {
        let variances: Vec<f64> = x
            .axis_iter(Axis(1))
            .map(|col| col.var(0.0))
            .collect();

        let selected = variances
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > threshold)
            .map(|(i, _)| i)
            .collect();

        self.selected_features = Some(selected);
    }

    /// Scan pairs in column order; the later feature of a correlated pair is dropped
    fn fit_correlation_threshold(&mut self, x: &Array2<f64>, threshold: f64) {
        let n_features = x.ncols();
        let mut to_remove: BTreeSet<usize> = BTreeSet::new();
        self.removed_pairs.clear();

        for i in 0..n_features {
            if to_remove.contains(&i) {
                continue;
            }
            for j in (i + 1)..n_features {
                if to_remove.contains(&j) {
                    continue;
                }
                let corr = pearson_correlation(x.column(i), x.column(j));
                if corr.abs() > threshold {
                    to_remove.insert(j);
                    self.removed_pairs.push((i, j, corr));
                }
            }
        }

        self.selected_features = Some(
            (0..n_features)
                .filter(|i| !to_remove.contains(i))
                .collect(),
        );
    }
}

fn pearson_correlation(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let x_mean = x.mean().unwrap_or(0.0);
    let y_mean = y.mean().unwrap_or(0.0);

    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;

    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let denom = (sum_x2 * sum_y2).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        sum_xy / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variance_threshold() {
        let x = Array2::from_shape_vec(
            (5, 3),
            vec![
                1.0, 0.0, 1.0,
                2.0, 0.0, 2.0,
                3.0, 0.0, 3.0,
                4.0, 0.0, 4.0,
                5.0, 0.0, 5.0,
            ],
        ).unwrap();

        let mut selector = FeatureSelector::variance_threshold(0.0);
        selector.fit(&x).unwrap();

        // Column 1 (all zeros) should be removed
        assert_eq!(selector.selected_indices().unwrap(), &[0, 2]);
        assert!(selector.removed_pairs().is_empty());
    }

    #[test]
    fn test_correlation_filter() {
        let x = Array2::from_shape_vec(
            (5, 3),
            vec![
                1.0, 1.1, 5.0,
                2.0, 2.1, 4.0,
                3.0, 3.1, 3.0,
                4.0, 4.1, 2.0,
                5.0, 5.2, 1.5,
            ],
        ).unwrap();

        let mut selector = FeatureSelector::correlation_threshold(0.95);
        selector.fit(&x).unwrap();

        // Columns 1 and 2 both track column 0
        assert_eq!(selector.selected_indices().unwrap(), &[0]);
        let dropped: Vec<(usize, usize)> = selector.removed_pairs().iter().map(|&(k, d, _)| (k, d)).collect();
        assert_eq!(dropped, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_uncorrelated_kept() {
        let x = Array2::from_shape_vec(
            (4, 2),
            vec![1.0, 1.0, 2.0, -1.0, 3.0, 1.0, 4.0, -1.0],
        ).unwrap();
        let mut selector = FeatureSelector::correlation_threshold(0.95);
        selector.fit(&x).unwrap();
        assert_eq!(selector.selected_indices().unwrap(), &[0, 1]);
    }
}
