//! Engineered feature loading
//!
//! A [`FeatureProvider`] produces the [`Dataset`] every pipeline trains on.
//! [`prepare`] applies the optional selection, scaling and over-sampling
//! steps selected through [`FeatureOptions`].

mod csv;

pub use csv::{dataset_from_frame, CsvFeatureProvider};

use crate::error::{Result, TrainerError};
use crate::preprocessing::{FeatureSelector, MinMaxScaler};
use crate::synthetic::{RandomOverSampler, Sampler};
use crate::training::checkpoint::FeatureFingerprint;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Feature matrix with binary labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub feature_names: Vec<String>,
    /// Label-encoded categorical columns
    pub sparse_fields: Vec<String>,
    /// Numeric columns
    pub dense_fields: Vec<String>,
    /// Optional per-row group id (e.g. coupon)
    pub groups: Option<Array1<i64>>,
}

impl Dataset {
    /// Build a dataset with every feature treated as dense
    pub fn new(x: Array2<f64>, y: Array1<f64>, feature_names: Vec<String>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        if x.ncols() != feature_names.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(TrainerError::DataError(format!(
                "Labels must be 0 or 1, found {}",
                bad
            )));
        }

        Ok(Self {
            x,
            y,
            dense_fields: feature_names.clone(),
            feature_names,
            sparse_fields: Vec::new(),
            groups: None,
        })
    }

    /// Mark which features are sparse (categorical) fields; the rest are dense
    pub fn with_sparse_fields(mut self, sparse: Vec<String>) -> Self {
        self.dense_fields = self
            .feature_names
            .iter()
            .filter(|name| !sparse.contains(name))
            .cloned()
            .collect();
        self.sparse_fields = sparse;
        self
    }

    pub fn with_groups(mut self, groups: Array1<i64>) -> Result<Self> {
        if groups.len() != self.y.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} group ids", self.y.len()),
                actual: format!("{} group ids", groups.len()),
            });
        }
        self.groups = Some(groups);
        Ok(self)
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Share of positive labels
    pub fn positive_rate(&self) -> f64 {
        self.y.mean().unwrap_or(0.0)
    }

    /// Identity of the feature layout, stored with checkpoints
    pub fn fingerprint(&self) -> FeatureFingerprint {
        FeatureFingerprint::from_names(&self.feature_names)
    }

    /// Keep only the given feature columns
    fn select_features(mut self, keep: &[usize]) -> Self {
        let names: Vec<String> = keep
            .iter()
            .filter_map(|&i| self.feature_names.get(i).cloned())
            .collect();
        self.x = self.x.select(Axis(1), keep);
        self.sparse_fields.retain(|f| names.contains(f));
        self.dense_fields.retain(|f| names.contains(f));
        self.feature_names = names;
        self
    }

    /// Rows in the given order; indices may repeat
    fn select_rows(mut self, rows: &[usize]) -> Self {
        self.x = self.x.select(Axis(0), rows);
        self.y = self.y.select(Axis(0), rows);
        self.groups = self.groups.map(|g| g.select(Axis(0), rows));
        self
    }
}

/// Optional feature processing steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureOptions {
    /// Randomly duplicate minority-class rows up to class parity
    pub use_over_sampler: bool,
    /// Drop one feature of each highly correlated pair
    pub use_corr: bool,
    pub corr_threshold: f64,
    /// Drop features whose variance does not exceed the threshold
    pub use_variance: bool,
    pub variance_threshold: f64,
    /// Min-max scale every feature to [0, 1]
    pub scale: bool,
    /// Emit diagnostics (importances, ROC points)
    pub plot: bool,
    /// Seed for over-sampling
    pub random_state: Option<u64>,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        Self {
            use_over_sampler: false,
            use_corr: false,
            corr_threshold: 0.95,
            use_variance: false,
            variance_threshold: 0.0,
            scale: false,
            plot: false,
            random_state: Some(42),
        }
    }
}

impl FeatureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_over_sampler(mut self, enabled: bool) -> Self {
        self.use_over_sampler = enabled;
        self
    }

    pub fn with_corr(mut self, enabled: bool) -> Self {
        self.use_corr = enabled;
        self
    }

    pub fn with_variance(mut self, enabled: bool) -> Self {
        self.use_variance = enabled;
        self
    }

    pub fn with_scale(mut self, enabled: bool) -> Self {
        self.scale = enabled;
        self
    }

    pub fn with_plot(mut self, enabled: bool) -> Self {
        self.plot = enabled;
        self
    }
}

/// Source of the engineered feature set
pub trait FeatureProvider {
    fn load(&self, options: &FeatureOptions) -> Result<Dataset>;
}

/// Provider over a dataset already in memory
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    dataset: Dataset,
}

impl InMemoryProvider {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }
}

impl FeatureProvider for InMemoryProvider {
    fn load(&self, options: &FeatureOptions) -> Result<Dataset> {
        prepare(self.dataset.clone(), options)
    }
}

/// Apply the selected processing steps: variance filter, correlation filter,
/// min-max scaling, then over-sampling
pub fn prepare(mut dataset: Dataset, options: &FeatureOptions) -> Result<Dataset> {
    if options.use_variance {
        let mut selector = FeatureSelector::variance_threshold(options.variance_threshold);
        selector.fit(&dataset.x)?;
        let keep = selector.selected_indices().unwrap_or_default().to_vec();
        info!(
            kept = keep.len(),
            dropped = dataset.n_features() - keep.len(),
            "Variance filter applied"
        );
        dataset = dataset.select_features(&keep);
    }

    if options.use_corr {
        let mut selector = FeatureSelector::correlation_threshold(options.corr_threshold);
        selector.fit(&dataset.x)?;
        let keep = selector.selected_indices().unwrap_or_default().to_vec();
        for &(kept, dropped, r) in selector.removed_pairs() {
            debug!(
                kept = %dataset.feature_names[kept],
                dropped = %dataset.feature_names[dropped],
                r,
                "Correlated feature dropped"
            );
        }
        info!(
            kept = keep.len(),
            dropped = dataset.n_features() - keep.len(),
            threshold = options.corr_threshold,
            "Correlation filter applied"
        );
        dataset = dataset.select_features(&keep);
    }

    if dataset.n_features() == 0 {
        return Err(TrainerError::DataError(
            "Feature selection removed every feature".to_string(),
        ));
    }

    if options.scale {
        dataset.x = MinMaxScaler::new().fit_transform(&dataset.x)?;
    }

    if options.use_over_sampler {
        let labels: Array1<i64> = dataset.y.mapv(|v| v as i64);
        let mut sampler = RandomOverSampler::new();
        if let Some(seed) = options.random_state {
            sampler = sampler.with_seed(seed);
        }
        let indices = sampler.fit_resample(&labels)?;
        info!(
            before = dataset.n_samples(),
            after = indices.len(),
            "Minority class over-sampled"
        );
        dataset = dataset.select_rows(&indices);
    }

    Ok(dataset)
}
