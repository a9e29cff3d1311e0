//! K-Nearest Neighbors classifier
//!
//! Stores the training fold; the positive-class probability of a query is the
//! (weighted) share of positive labels among its k nearest training rows.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{Result, TrainerError};
use super::checkpoint::CheckpointSlot;
use super::models::{FitReport, FoldData, Model};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Minkowski(2.0)
    }
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::default(),
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Fit the classifier (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        if self.config.n_neighbors == 0 {
            return Err(TrainerError::ConfigError("n_neighbors must be positive".to_string()));
        }
        if x.nrows() < self.config.n_neighbors {
            return Err(TrainerError::TrainingError(format!(
                "{} training rows but n_neighbors = {}",
                x.nrows(),
                self.config.n_neighbors
            )));
        }
        if let DistanceMetric::Minkowski(p) = self.config.metric {
            if p < 1.0 {
                return Err(TrainerError::ConfigError(format!("Minkowski p must be >= 1, got {}", p)));
            }
        }

        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Probability of the positive class (parallelized over query rows)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(TrainerError::ModelNotFitted),
        };
        if x.ncols() != x_train.ncols() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let k = self.config.n_neighbors;
        let metric = self.config.metric;
        let weights = self.config.weights;

        let probs: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k, metric);
                positive_share(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(probs))
    }
}

impl Model for KNNClassifier {
    fn tag(&self) -> &'static str {
        "knn"
    }

    fn fit(&mut self, train: &FoldData, _val: &FoldData, _checkpoint: Option<&CheckpointSlot>) -> Result<FitReport> {
        KNNClassifier::fit(self, &train.x, &train.y)?;
        Ok(FitReport {
            iterations: 1,
            ..Default::default()
        })
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KNNClassifier::predict_proba(self, x)
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances)
#[derive(PartialEq)]
struct DistLabel(f64, f64);

impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, &label) in x_train.outer_iter().zip(y_train.iter()) {
        let dist = compute_distance(point, row, metric);
        if heap.len() < k {
            heap.push(DistLabel(dist, label));
        } else if let Some(top) = heap.peek() {
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, label));
            }
        }
    }

    heap.into_iter().map(|dl| (dl.0, dl.1)).collect()
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    let diffs = a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs());
    match metric {
        DistanceMetric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
        DistanceMetric::Manhattan => diffs.sum(),
        DistanceMetric::Minkowski(p) => diffs.map(|d| d.powf(p)).sum::<f64>().powf(1.0 / p),
    }
}

/// Weighted share of positive labels among the neighbors
fn positive_share(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let mut positive = 0.0;
    let mut total = 0.0;
    for &(dist, label) in neighbors {
        let weight = match weights {
            WeightScheme::Uniform => 1.0,
            WeightScheme::Distance => 1.0 / (dist + 1e-10),
        };
        if label > 0.5 {
            positive += weight;
        }
        total += weight;
    }
    if total > 0.0 { positive / total } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn classifier(k: usize) -> KNNClassifier {
        KNNClassifier::new(KNNConfig { n_neighbors: k, ..Default::default() })
    }

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        // Create linearly separable data
        let x = Array2::from_shape_vec((20, 2), vec![
            // Class 0 (low values)
            1.0, 1.0, 1.5, 1.5, 2.0, 2.0, 2.5, 2.5, 1.0, 2.0,
            1.5, 2.5, 2.0, 1.5, 2.5, 1.0, 1.2, 1.8, 1.8, 1.2,
            // Class 1 (high values)
            8.0, 8.0, 8.5, 8.5, 9.0, 9.0, 9.5, 9.5, 8.0, 9.0,
            8.5, 9.5, 9.0, 8.5, 9.5, 8.0, 8.2, 8.8, 8.8, 8.2,
        ]).unwrap();

        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
        ]);

        (x, y)
    }

    #[test]
    fn test_knn_classifier() {
        let (x, y) = create_classification_data();

        let mut knn = classifier(3);
        knn.fit(&x, &y).unwrap();

        let proba = knn.predict_proba(&x).unwrap();
        for (p, label) in proba.iter().zip(y.iter()) {
            assert_eq!(*p, *label);
        }
    }

    #[test]
    fn test_uniform_share() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = array![1.0, 0.0, 1.0, 0.0];
        let mut knn = classifier(3);
        knn.fit(&x, &y).unwrap();
        let p = knn.predict_proba(&array![[1.0]]).unwrap();
        assert!((p[0] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_metrics() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert!((compute_distance(a.view(), b.view(), DistanceMetric::Euclidean) - 5.0).abs() < 1e-9);
        assert!((compute_distance(a.view(), b.view(), DistanceMetric::Minkowski(2.0)) - 5.0).abs() < 1e-9);
        assert!((compute_distance(a.view(), b.view(), DistanceMetric::Manhattan) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_knn() {
        let (x, y) = create_classification_data();

        let mut knn = KNNClassifier::new(KNNConfig {
            n_neighbors: 5,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        knn.fit(&x, &y).unwrap();

        let proba = knn.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 20);
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_errors() {
        let knn = classifier(3);
        assert!(matches!(knn.predict_proba(&array![[0.0]]), Err(TrainerError::ModelNotFitted)));

        let mut knn = classifier(5);
        assert!(knn.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]).is_err());
    }
}
