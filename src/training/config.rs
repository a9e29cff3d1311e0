//! Pipeline configuration
//!
//! [`PipelineConfig::for_model`] gives the preset of each pipeline: fold
//! strategy, feature options and model hyperparameters.

use crate::error::{Result, TrainerError};
use crate::features::FeatureOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::cross_validation::CVStrategy;
use super::knn::{KNNClassifier, KNNConfig};
use super::models::Model;
use super::neural_network::{FnnClassifier, NetworkConfig};
use super::pnn::{PnnClassifier, PnnConfig};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};

/// Model family of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Fnn,
    Pnn,
    #[value(alias = "xgb")]
    #[serde(alias = "xgb")]
    Xgboost,
    Knn,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [ModelKind::Fnn, ModelKind::Pnn, ModelKind::Xgboost, ModelKind::Knn];

    /// Identifier used in logs and file names
    pub fn tag(&self) -> &'static str {
        match self {
            ModelKind::Fnn => "fnn",
            ModelKind::Pnn => "pnn",
            ModelKind::Xgboost => "xgb",
            ModelKind::Knn => "knn",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ModelKind::Fnn => "Feed-forward network (128, 64), dropout 0.5",
            ModelKind::Pnn => "Product-based network with pairwise field products",
            ModelKind::Xgboost => "Second-order gradient-boosted trees",
            ModelKind::Knn => "k-nearest neighbours (k=5, Minkowski p=2)",
        }
    }

    /// Whether fold models are persisted and restored
    pub fn uses_checkpoints(&self) -> bool {
        matches!(self, ModelKind::Fnn | ModelKind::Pnn)
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ModelKind {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fnn" => Ok(ModelKind::Fnn),
            "pnn" => Ok(ModelKind::Pnn),
            "xgb" | "xgboost" => Ok(ModelKind::Xgboost),
            "knn" => Ok(ModelKind::Knn),
            other => Err(TrainerError::ConfigError(format!("Unknown model '{}'", other))),
        }
    }
}

/// Hyperparameters of every model family; only the selected one is used
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub fnn: NetworkConfig,
    pub pnn: PnnConfig,
    pub xgboost: XGBoostConfig,
    pub knn: KNNConfig,
}

/// Full configuration of one cross-validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model: ModelKind,
    pub cv: CVStrategy,
    /// Seed for fold shuffling
    pub random_state: Option<u64>,
    pub features: FeatureOptions,
    pub checkpoint_dir: PathBuf,
    /// Restore folds from existing checkpoints and persist new ones
    pub use_checkpoints: bool,
    /// Where OOF predictions and diagnostics are written; nothing is written when unset
    pub output_dir: Option<PathBuf>,
    /// Export the ROC curve of the OOF predictions
    pub roc_curve: bool,
    pub params: ModelParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_model(ModelKind::Fnn)
    }
}

impl PipelineConfig {
    /// Preset for a model family
    pub fn for_model(model: ModelKind) -> Self {
        let (cv, features) = match model {
            ModelKind::Fnn => (
                CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true },
                FeatureOptions::new().with_over_sampler(true).with_scale(true),
            ),
            ModelKind::Pnn => (
                CVStrategy::KFold { n_splits: 5, shuffle: false },
                FeatureOptions::new()
                    .with_corr(true)
                    .with_variance(true)
                    .with_scale(true)
                    .with_plot(true),
            ),
            ModelKind::Xgboost => (
                CVStrategy::KFold { n_splits: 5, shuffle: false },
                FeatureOptions::new()
                    .with_corr(true)
                    .with_variance(true)
                    .with_plot(true),
            ),
            ModelKind::Knn => (
                CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false },
                FeatureOptions::new().with_over_sampler(true).with_scale(true),
            ),
        };

        Self {
            model,
            cv,
            random_state: Some(42),
            features,
            checkpoint_dir: PathBuf::from("checkpoints"),
            use_checkpoints: model.uses_checkpoints(),
            output_dir: None,
            roc_curve: matches!(model, ModelKind::Fnn | ModelKind::Knn),
            params: ModelParams::default(),
        }
    }

    /// Load a configuration from a JSON file.
    ///
    /// The file is overlaid on the preset of its `model` (FNN when absent), so
    /// it only needs the fields that differ.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let overlay: Value = serde_json::from_str(&json)?;

        let model = match overlay.get("model") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => ModelKind::Fnn,
        };
        let mut merged = serde_json::to_value(Self::for_model(model))?;
        merge_json(&mut merged, overlay);

        Ok(serde_json::from_value(merged)?)
    }

    pub fn with_folds(mut self, n_splits: usize) -> Self {
        self.cv = match self.cv {
            CVStrategy::KFold { shuffle, .. } => CVStrategy::KFold { n_splits, shuffle },
            CVStrategy::StratifiedKFold { shuffle, .. } => CVStrategy::StratifiedKFold { n_splits, shuffle },
        };
        self
    }

    pub fn with_cv(mut self, cv: CVStrategy) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_features(mut self, features: FeatureOptions) -> Self {
        self.features = features;
        self
    }

    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    pub fn with_checkpoints(mut self, enabled: bool) -> Self {
        self.use_checkpoints = enabled;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_roc_curve(mut self, enabled: bool) -> Self {
        self.roc_curve = enabled;
        self
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Fresh, unfitted model for one fold
    pub fn build_model(&self) -> Box<dyn Model> {
        match self.model {
            ModelKind::Fnn => Box::new(FnnClassifier::new(self.params.fnn.clone())),
            ModelKind::Pnn => Box::new(PnnClassifier::new(self.params.pnn.clone())),
            ModelKind::Xgboost => Box::new(XGBoostClassifier::new(self.params.xgboost.clone())),
            ModelKind::Knn => Box::new(KNNClassifier::new(self.params.knn.clone())),
        }
    }
}

/// Recursively overlay object fields; any other value replaces the base
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) if !is_variant_switch(&*base, &overlay) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Externally tagged enums serialize as a single-key object; a different key
/// selects another variant and must replace the base rather than merge into it
fn is_variant_switch(base: &Map<String, Value>, overlay: &Map<String, Value>) -> bool {
    base.len() == 1 && overlay.len() == 1 && overlay.keys().all(|k| !base.contains_key(k))
}
