//! Model trait and the checkpoint-or-train adapter

use crate::error::{Result, TrainerError};
use super::checkpoint::CheckpointSlot;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Rows of one side of a fold
#[derive(Debug, Clone)]
pub struct FoldData {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

impl FoldData {
    /// Gather the given rows of a dataset
    pub fn gather(x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Self {
        Self {
            x: x.select(Axis(0), indices),
            y: y.select(Axis(0), indices),
        }
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Summary of a completed fit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitReport {
    /// Epochs (or boosting rounds) actually run
    pub iterations: usize,
    /// Iteration whose parameters were kept
    pub best_iteration: Option<usize>,
    /// Monitored validation loss at the best iteration
    pub best_val_loss: Option<f64>,
    pub stopped_early: bool,
}

/// How a fold's model came to be
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FitOutcome {
    Trained(FitReport),
    /// Parameters were loaded from an existing checkpoint; nothing was fitted
    Restored,
}

impl FitOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, FitOutcome::Restored)
    }
}

/// Binary classifier trained once per fold
pub trait Model: Send + Sync {
    /// Short identifier used in logs and checkpoint file names
    fn tag(&self) -> &'static str;

    /// Fit on `train`, monitoring `val` for early stopping where supported.
    ///
    /// Checkpointing models persist every improved snapshot to `checkpoint`
    /// and finish holding the best one.
    fn fit(
        &mut self,
        train: &FoldData,
        val: &FoldData,
        checkpoint: Option<&CheckpointSlot>,
    ) -> Result<FitReport>;

    /// Probability of the positive class for each row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Whether fitted parameters can be persisted and restored
    fn supports_checkpoint(&self) -> bool {
        false
    }

    /// Replace the model's parameters with a stored snapshot
    fn restore(&mut self, slot: &CheckpointSlot) -> Result<()> {
        Err(TrainerError::CheckpointError {
            path: slot.path().to_path_buf(),
            reason: format!("{} models are not checkpointed", self.tag()),
        })
    }
}

/// Restore the fold's model from its checkpoint when one exists, otherwise fit it.
///
/// `checkpoint` is ignored for models that do not support checkpoints.
pub fn train_or_load(
    model: &mut dyn Model,
    checkpoint: Option<&CheckpointSlot>,
    train: &FoldData,
    val: &FoldData,
) -> Result<FitOutcome> {
    let slot = checkpoint.filter(|_| model.supports_checkpoint());

    if let Some(slot) = slot {
        if slot.exists() {
            model.restore(slot)?;
            info!(
                model = model.tag(),
                fold = slot.fold(),
                path = %slot.path().display(),
                "Restored parameters from checkpoint, skipping training"
            );
            return Ok(FitOutcome::Restored);
        }
    }

    let report = model.fit(train, val, slot)?;
    info!(
        model = model.tag(),
        iterations = report.iterations,
        best_iteration = ?report.best_iteration,
        best_val_loss = ?report.best_val_loss,
        stopped_early = report.stopped_early,
        "Model fitted"
    );
    Ok(FitOutcome::Trained(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::checkpoint::{CheckpointStore, FeatureFingerprint};
    use ndarray::array;

    /// Predicts a constant that is learned as the training label mean
    struct MeanModel {
        mean: Option<f64>,
        fits: usize,
    }

    impl Model for MeanModel {
        fn tag(&self) -> &'static str {
            "mean"
        }

        fn fit(&mut self, train: &FoldData, _val: &FoldData, checkpoint: Option<&CheckpointSlot>) -> Result<FitReport> {
            let mean = train.y.mean().unwrap_or(0.5);
            self.mean = Some(mean);
            self.fits += 1;
            if let Some(slot) = checkpoint {
                slot.save(&mean, Some(0), None)?;
            }
            Ok(FitReport { iterations: 1, ..Default::default() })
        }

        fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            let mean = self.mean.ok_or(TrainerError::ModelNotFitted)?;
            Ok(Array1::from_elem(x.nrows(), mean))
        }

        fn supports_checkpoint(&self) -> bool {
            true
        }

        fn restore(&mut self, slot: &CheckpointSlot) -> Result<()> {
            self.mean = Some(slot.load::<f64>()?.params);
            Ok(())
        }
    }

    fn fold() -> FoldData {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 1.0, 1.0];
        FoldData::gather(&x, &y, &[1, 2, 3])
    }

    #[test]
    fn test_gather() {
        let data = fold();
        assert_eq!(data.len(), 3);
        assert_eq!(data.x[[0, 0]], 1.0);
    }

    #[test]
    fn test_train_then_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let slot = store.slot("mean", 0, FeatureFingerprint::from_names(&["f".to_string()]));
        let train = fold();

        let mut first = MeanModel { mean: None, fits: 0 };
        let outcome = train_or_load(&mut first, Some(&slot), &train, &train).unwrap();
        assert!(!outcome.is_restored());
        assert_eq!(first.fits, 1);

        let mut second = MeanModel { mean: None, fits: 0 };
        let outcome = train_or_load(&mut second, Some(&slot), &train, &train).unwrap();
        assert!(outcome.is_restored());
        assert_eq!(second.fits, 0);

        let x = array![[5.0], [6.0]];
        assert_eq!(
            first.predict_proba(&x).unwrap(),
            second.predict_proba(&x).unwrap()
        );
    }

    #[test]
    fn test_corrupt_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let slot = store.slot("mean", 1, FeatureFingerprint::from_names(&["f".to_string()]));
        std::fs::write(slot.path(), b"{\"model\": \"mean\", \"fold\":").unwrap();

        let train = fold();
        let mut model = MeanModel { mean: None, fits: 0 };
        let err = train_or_load(&mut model, Some(&slot), &train, &train).unwrap_err();
        assert!(matches!(err, TrainerError::CheckpointError { .. }));
        // No silent retrain over the broken file
        assert_eq!(model.fits, 0);
        assert!(model.mean.is_none());
    }

    #[test]
    fn test_no_slot_always_trains() {
        let train = fold();
        let mut model = MeanModel { mean: None, fits: 0 };
        train_or_load(&mut model, None, &train, &train).unwrap();
        train_or_load(&mut model, None, &train, &train).unwrap();
        assert_eq!(model.fits, 2);
    }
}
