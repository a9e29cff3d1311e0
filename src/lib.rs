//! oof-trainer - k-fold cross-validation trainer for binary classifiers
//!
//! Each pipeline splits a feature set into folds, trains one model per fold
//! (or restores it from a checkpoint), scores the validation fold by ROC AUC
//! and assembles out-of-fold predictions over the whole dataset.
//!
//! # Modules
//!
//! - [`features`] - Feature loading and preparation
//! - [`preprocessing`] - Scaling and feature selection
//! - [`synthetic`] - Random over-sampling
//! - [`training`] - Splitters, models, checkpoints and the CV engine
//! - [`metrics`] - AUC, ROC curve, grouped AUC, log loss
//! - [`export`] - CSV export of OOF predictions and diagnostics
//! - [`cli`] - Command-line interface

pub mod error;

pub mod features;
pub mod preprocessing;
pub mod synthetic;

pub mod metrics;
pub mod training;

pub mod export;
pub mod cli;

pub use error::{Result, TrainerError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Result, TrainerError};

    pub use crate::features::{CsvFeatureProvider, Dataset, FeatureOptions, FeatureProvider, InMemoryProvider};

    pub use crate::preprocessing::{FeatureSelector, MinMaxScaler, SelectionMethod};

    pub use crate::synthetic::{RandomOverSampler, Sampler};

    pub use crate::metrics::{grouped_auc, roc_auc_score, roc_curve};

    pub use crate::training::{
        oof_predictions, train_or_load, CVReport, CVStrategy, CheckpointStore, CrossValEngine,
        CrossValidator, FitOutcome, Model, ModelKind, OofTable, PipelineConfig,
    };
    pub use crate::training::{FnnClassifier, KNNClassifier, PnnClassifier, XGBoostClassifier};
}
