//! Out-of-fold prediction table

use crate::error::{Result, TrainerError};
use crate::metrics::roc_auc_score;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Predictions collected while each sample was held out.
///
/// Every sample index must be written exactly once across all folds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OofTable {
    labels: Array1<f64>,
    predictions: Vec<Option<f64>>,
}

impl OofTable {
    /// Empty table for the given labels
    pub fn new(labels: Array1<f64>) -> Self {
        let n = labels.len();
        Self {
            labels,
            predictions: vec![None; n],
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of indices that already hold a prediction
    pub fn n_filled(&self) -> usize {
        self.predictions.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.predictions.iter().all(Option::is_some)
    }

    /// Write one fold's validation predictions back to their original indices
    pub fn write(&mut self, indices: &[usize], predictions: &Array1<f64>) -> Result<()> {
        if indices.len() != predictions.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} predictions", indices.len()),
                actual: format!("{} predictions", predictions.len()),
            });
        }

        // Validate first so a failed write leaves the table untouched
        for &idx in indices {
            match self.predictions.get(idx) {
                None => {
                    return Err(TrainerError::ValidationError(format!(
                        "Index {} out of range for {} samples",
                        idx,
                        self.len()
                    )))
                }
                Some(Some(_)) => return Err(TrainerError::DuplicatePrediction { index: idx }),
                Some(None) => {}
            }
        }

        for (&idx, &p) in indices.iter().zip(predictions.iter()) {
            self.predictions[idx] = Some(p);
        }
        Ok(())
    }

    /// Prediction stored for a sample, if any
    pub fn get(&self, index: usize) -> Option<(f64, f64)> {
        let p = self.predictions.get(index).copied().flatten()?;
        Some((self.labels[index], p))
    }

    pub fn labels(&self) -> &Array1<f64> {
        &self.labels
    }

    /// All predictions; fails if any index was never written
    pub fn predictions(&self) -> Result<Array1<f64>> {
        let missing = self.predictions.iter().filter(|p| p.is_none()).count();
        if missing > 0 {
            return Err(TrainerError::IncompletePredictions {
                missing,
                total: self.len(),
            });
        }
        Ok(self.predictions.iter().map(|p| p.unwrap_or_default()).collect())
    }

    /// AUC over the concatenated out-of-fold predictions
    pub fn auc(&self) -> Result<f64> {
        let preds = self.predictions()?;
        roc_auc_score(&self.labels, &preds)
    }
}
