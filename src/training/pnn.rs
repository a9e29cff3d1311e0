//! Product-based neural network
//!
//! The input vector is extended with the inner products of every pair of the
//! leading fields before it reaches the dense layers. Field embeddings are not
//! learned; each field contributes its (scaled) value directly.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use super::checkpoint::CheckpointSlot;
use super::models::{FitReport, FoldData, Model};
use super::neural_network::{BinaryNetwork, NetworkConfig, ValidationSource};

/// PNN hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnnConfig {
    pub network: NetworkConfig,
    /// Fields taking part in the product layer; pairs grow quadratically
    pub max_product_fields: usize,
}

impl Default for PnnConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                patience: 10,
                validation: ValidationSource::TrainTail { fraction: 0.2 },
                ..NetworkConfig::default()
            },
            max_product_fields: 32,
        }
    }
}

/// Concatenate `x` with the pairwise products of its first `max_fields` columns
pub fn product_layer(x: &Array2<f64>, max_fields: usize) -> Array2<f64> {
    let m = x.ncols().min(max_fields);
    let n_pairs = m * m.saturating_sub(1) / 2;
    let mut out = Array2::zeros((x.nrows(), x.ncols() + n_pairs));

    for (row_in, mut row_out) in x.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
        let mut col = 0;
        for &v in row_in.iter() {
            row_out[col] = v;
            col += 1;
        }
        for i in 0..m {
            for j in (i + 1)..m {
                row_out[col] = row_in[i] * row_in[j];
                col += 1;
            }
        }
    }

    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnnClassifier {
    config: PnnConfig,
    network: BinaryNetwork,
}

impl PnnClassifier {
    pub fn new(config: PnnConfig) -> Self {
        let network = BinaryNetwork::new(config.network.clone());
        Self { config, network }
    }

    fn expand(&self, x: &Array2<f64>) -> Array2<f64> {
        product_layer(x, self.config.max_product_fields)
    }
}

impl Model for PnnClassifier {
    fn tag(&self) -> &'static str {
        "pnn"
    }

    fn fit(&mut self, train: &FoldData, val: &FoldData, checkpoint: Option<&CheckpointSlot>) -> Result<FitReport> {
        let x_train = self.expand(&train.x);
        let x_val = self.expand(&val.x);
        self.network.fit(&x_train, &train.y, &x_val, &val.y, checkpoint)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.network.predict_proba(&self.expand(x))
    }

    fn supports_checkpoint(&self) -> bool {
        true
    }

    fn restore(&mut self, slot: &CheckpointSlot) -> Result<()> {
        self.network.restore(slot)
    }
}
