//! Cross-validation engine
//!
//! Runs one pipeline end to end: split, checkpoint-or-train per fold, score
//! each validation fold, collect out-of-fold predictions, summarize.

use crate::error::Result;
use crate::export;
use crate::features::{Dataset, FeatureProvider};
use crate::metrics::{grouped_auc, roc_auc_score, roc_curve};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, info_span, warn};

use super::checkpoint::CheckpointStore;
use super::config::{ModelKind, PipelineConfig};
use super::cross_validation::{CVResults, CrossValidator};
use super::models::{train_or_load, FitOutcome, FoldData};
use super::oof::OofTable;

/// Outcome of a single fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold: usize,
    pub n_train: usize,
    pub n_val: usize,
    /// AUC on the fold's validation rows
    pub auc: f64,
    pub outcome: FitOutcome,
    /// (feature, importance) for models that expose importances
    pub importances: Option<Vec<(String, f64)>>,
    pub elapsed_secs: f64,
}

/// Result of a full cross-validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVReport {
    pub model: ModelKind,
    pub n_samples: usize,
    pub n_features: usize,
    pub folds: Vec<FoldResult>,
    /// Mean and std of the fold AUCs
    pub summary: CVResults,
    /// AUC over all out-of-fold predictions
    pub oof_auc: f64,
    /// Mean per-group AUC, when the dataset carries group ids
    pub grouped_auc: Option<f64>,
    pub oof: OofTable,
    /// Files written to the output directory
    pub artifacts: Vec<PathBuf>,
}

impl CVReport {
    pub fn mean_auc(&self) -> f64 {
        self.summary.mean_score
    }

    pub fn n_restored(&self) -> usize {
        self.folds.iter().filter(|f| f.outcome.is_restored()).count()
    }
}

/// Drives the k-fold pipeline described by a [`PipelineConfig`]
#[derive(Debug, Clone)]
pub struct CrossValEngine {
    config: PipelineConfig,
}

impl CrossValEngine {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load features from `provider` and run
    pub fn run(&self, provider: &dyn FeatureProvider) -> Result<CVReport> {
        let dataset = provider.load(&self.config.features)?;
        self.run_dataset(&dataset)
    }

    /// Run on an already prepared dataset
    pub fn run_dataset(&self, dataset: &Dataset) -> Result<CVReport> {
        let start = Instant::now();
        let tag = self.config.model.tag();
        let n_samples = dataset.n_samples();

        let mut validator = CrossValidator::new(self.config.cv.clone());
        if let Some(seed) = self.config.random_state {
            validator = validator.with_random_state(seed);
        }
        let splits = validator.split(n_samples, Some(&dataset.y))?;

        info!(
            model = tag,
            n_samples,
            n_features = dataset.n_features(),
            n_folds = splits.len(),
            positive_rate = dataset.positive_rate(),
            "Starting cross-validation"
        );

        let store = self
            .config
            .use_checkpoints
            .then(|| CheckpointStore::new(&self.config.checkpoint_dir));
        let fingerprint = dataset.fingerprint();
        let plot_dir = self.config.output_dir.as_ref().filter(|_| self.config.features.plot);

        let mut oof = OofTable::new(dataset.y.clone());
        let mut folds = Vec::with_capacity(splits.len());
        let mut artifacts = Vec::new();

        for split in &splits {
            let fold = split.fold_idx;
            let _span = info_span!("fold", model = tag, fold).entered();
            let fold_start = Instant::now();

            let train = FoldData::gather(&dataset.x, &dataset.y, &split.train_indices);
            let val = FoldData::gather(&dataset.x, &dataset.y, &split.test_indices);
            info!(n_train = train.len(), n_val = val.len(), "Fold started");

            let mut model = self.config.build_model();
            let slot = store
                .as_ref()
                .map(|s| s.slot(model.tag(), fold, fingerprint.clone()));

            let outcome = train_or_load(model.as_mut(), slot.as_ref(), &train, &val)?;
            let predictions = model.predict_proba(&val.x)?;
            let auc = roc_auc_score(&val.y, &predictions)?;
            oof.write(&split.test_indices, &predictions)?;

            let raw_importances = model.feature_importances();
            if let (Some(dir), Some(imp)) = (plot_dir, raw_importances.as_ref()) {
                artifacts.push(export::write_importances(dir, tag, fold, &dataset.feature_names, imp)?);
            }
            let importances = raw_importances.map(|imp| {
                dataset
                    .feature_names
                    .iter()
                    .cloned()
                    .zip(imp.iter().copied())
                    .collect::<Vec<_>>()
            });

            let elapsed_secs = fold_start.elapsed().as_secs_f64();
            info!(auc, restored = outcome.is_restored(), elapsed_secs, "Fold finished");

            folds.push(FoldResult {
                fold,
                n_train: train.len(),
                n_val: val.len(),
                auc,
                outcome,
                importances,
                elapsed_secs,
            });
        }

        let summary = CVResults::from_scores(folds.iter().map(|f| f.auc).collect());
        let oof_auc = oof.auc()?;
        let oof_predictions = oof.predictions()?;

        let grouped = match &dataset.groups {
            Some(groups) => {
                let score = grouped_auc(&dataset.y, &oof_predictions, groups)?;
                if score.is_none() {
                    warn!("No group contains both classes; grouped AUC undefined");
                }
                score
            }
            None => None,
        };

        if let Some(dir) = &self.config.output_dir {
            artifacts.push(export::write_oof(dir, tag, &oof)?);
            if self.config.roc_curve {
                let curve = roc_curve(&dataset.y, &oof_predictions)?;
                artifacts.push(export::write_roc(dir, tag, &curve)?);
            }
        }

        info!(
            model = tag,
            mean_auc = summary.mean_score,
            std_auc = summary.std_score,
            oof_auc,
            grouped_auc = ?grouped,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Cross-validation finished"
        );

        let mut report = CVReport {
            model: self.config.model,
            n_samples,
            n_features: dataset.n_features(),
            folds,
            summary,
            oof_auc,
            grouped_auc: grouped,
            oof,
            artifacts,
        };

        if let Some(dir) = &self.config.output_dir {
            let path = dir.join(format!("report_{}.json", tag));
            fs::create_dir_all(dir)?;
            fs::write(&path, serde_json::to_vec_pretty(&report)?)?;
            report.artifacts.push(path);
        }

        Ok(report)
    }
}

/// Out-of-fold predictions as an array ordered by sample index
pub fn oof_predictions(report: &CVReport) -> Result<Array1<f64>> {
    report.oof.predictions()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureOptions;
    use crate::training::cross_validation::CVStrategy;
    use ndarray::{Array1, Array2};

    fn dataset(n: usize) -> Dataset {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * (j + 3)) % 17) as f64 / 17.0);
        let y: Array1<f64> = (0..n).map(|i| (i % 2) as f64).collect();
        let names = vec!["a".to_string(), "b".to_string()];
        Dataset::new(x, y, names).unwrap()
    }

    fn knn_config() -> PipelineConfig {
        PipelineConfig::for_model(ModelKind::Knn).with_features(FeatureOptions::default())
    }

    #[test]
    fn test_knn_run_fills_oof() {
        let engine = CrossValEngine::new(knn_config());
        let report = engine.run_dataset(&dataset(100)).unwrap();

        assert_eq!(report.folds.len(), 5);
        assert!(report.folds.iter().all(|f| f.n_val == 20 && f.n_train == 80));
        assert!(report.oof.is_complete());
        assert!((0.0..=1.0).contains(&report.oof_auc));
        assert!((0.0..=1.0).contains(&report.mean_auc()));
        assert!(report.grouped_auc.is_none());
        assert!(report.artifacts.is_empty());
    }

    #[test]
    fn test_grouped_auc_reported() {
        let ds = dataset(60)
            .with_groups((0..60).map(|i| (i / 10) as i64).collect())
            .unwrap();
        let report = CrossValEngine::new(knn_config()).run_dataset(&ds).unwrap();
        let grouped = report.grouped_auc.unwrap();
        assert!((0.0..=1.0).contains(&grouped));
    }

    #[test]
    fn test_outputs_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::for_model(ModelKind::Xgboost)
            .with_cv(CVStrategy::StratifiedKFold { n_splits: 3, shuffle: true })
            .with_output_dir(dir.path());
        config.params.xgboost.n_estimators = 5;

        let report = CrossValEngine::new(config).run_dataset(&dataset(60)).unwrap();
        assert!(dir.path().join("oof_xgb.csv").exists());
        assert!(!dir.path().join("roc_xgb.csv").exists());
        assert!(dir.path().join("importance_xgb_0.csv").exists());
        assert!(dir.path().join("report_xgb.json").exists());
        assert!(report.folds.iter().all(|f| f.importances.is_some()));
        assert_eq!(oof_predictions(&report).unwrap().len(), 60);
    }

    #[test]
    fn test_roc_exported_for_fnn_and_knn() {
        let dir = tempfile::tempdir().unwrap();
        for kind in [ModelKind::Fnn, ModelKind::Knn] {
            let mut config = PipelineConfig::for_model(kind)
                .with_features(FeatureOptions::default())
                .with_checkpoints(false)
                .with_output_dir(dir.path());
            config.params.fnn.hidden_layers = vec![4];
            config.params.fnn.max_epochs = 3;
            assert!(!config.features.plot);

            CrossValEngine::new(config).run_dataset(&dataset(50)).unwrap();
            let roc = dir.path().join(format!("roc_{}.csv", kind.tag()));
            assert!(roc.exists(), "missing {}", roc.display());
        }
    }

    #[test]
    fn test_too_many_folds_rejected() {
        let config = knn_config().with_folds(10);
        assert!(CrossValEngine::new(config).run_dataset(&dataset(5)).is_err());
    }
}
