//! Model training module
//!
//! Provides the k-fold training pipeline and its models:
//! - Cross-validation splitters (k-fold, stratified k-fold)
//! - Checkpoint store and early stopping
//! - Feed-forward and product-based neural networks
//! - XGBoost-style gradient boosting
//! - K-Nearest Neighbors
//! - Out-of-fold prediction table and the cross-validation engine

mod config;
mod engine;
mod models;
pub mod checkpoint;
pub mod cross_validation;
pub mod early_stopping;
pub mod knn;
pub mod neural_network;
pub mod oof;
pub mod pnn;
pub mod xgboost;

pub use config::{ModelKind, ModelParams, PipelineConfig};
pub use engine::{oof_predictions, CVReport, CrossValEngine, FoldResult};
pub use models::{train_or_load, FitOutcome, FitReport, FoldData, Model};
pub use checkpoint::{CheckpointRecord, CheckpointSlot, CheckpointStore, FeatureFingerprint};
pub use cross_validation::{CrossValidator, CVStrategy, CVSplit, CVResults};
pub use early_stopping::{EarlyStopping, StopDecision};
pub use knn::{KNNClassifier, KNNConfig, DistanceMetric, WeightScheme};
pub use neural_network::{BinaryNetwork, FnnClassifier, NetworkConfig, NetworkParams, ValidationSource};
pub use oof::OofTable;
pub use pnn::{PnnClassifier, PnnConfig};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
