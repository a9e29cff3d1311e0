//! Feed-forward neural network for binary classification
//!
//! ReLU hidden layers with inverted dropout, a single sigmoid output unit,
//! binary cross-entropy loss and the Adam optimizer. Training monitors the
//! validation loss and keeps the best parameter snapshot, persisting every
//! improvement when a checkpoint slot is given.

use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, TrainerError};
use crate::metrics::log_loss;
use super::checkpoint::CheckpointSlot;
use super::early_stopping::{EarlyStopping, StopDecision};
use super::models::{FitReport, FoldData, Model};

/// Where the early stopping monitor gets its validation rows from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationSource {
    /// The cross-validation fold's own held-out rows
    Fold,
    /// The last `fraction` of the training rows, taken before any shuffling
    TrainTail { fraction: f64 },
}

/// Network and optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Dropout rate applied after each hidden layer while training
    pub dropout: f64,
    /// Adam step size
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// L2 penalty on weights
    pub l2_reg: f64,
    pub batch_size: usize,
    pub max_epochs: usize,
    /// Epochs without validation improvement before stopping
    pub patience: usize,
    pub min_delta: f64,
    pub validation: ValidationSource,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![128, 64],
            dropout: 0.5,
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            l2_reg: 0.0,
            batch_size: 1024,
            max_epochs: 1000,
            patience: 15,
            min_delta: 0.0,
            validation: ValidationSource::Fold,
            random_state: Some(1024),
        }
    }
}

/// Trainable parameters of the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub weights: Vec<Array2<f64>>,
    pub biases: Vec<Array1<f64>>,
}

impl NetworkParams {
    /// Xavier/Glorot uniform initialization
    fn init(layer_sizes: &[usize], rng: &mut Xoshiro256PlusPlus) -> Self {
        let mut weights = Vec::with_capacity(layer_sizes.len() - 1);
        let mut biases = Vec::with_capacity(layer_sizes.len() - 1);

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let scale = (6.0 / (n_in + n_out) as f64).sqrt();
            weights.push(Array2::from_shape_fn((n_in, n_out), |_| {
                rng.gen::<f64>() * 2.0 * scale - scale
            }));
            biases.push(Array1::zeros(n_out));
        }

        Self { weights, biases }
    }

    pub fn n_inputs(&self) -> usize {
        self.weights.first().map(|w| w.nrows()).unwrap_or(0)
    }
}

struct ForwardPass {
    /// Layer inputs; `activations[0]` is the batch itself, the last entry the sigmoid output
    activations: Vec<Array2<f64>>,
    pre_activations: Vec<Array2<f64>>,
    /// Scaled dropout masks for hidden layers (training only)
    masks: Vec<Option<Array2<f64>>>,
}

struct AdamState {
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
    step: i32,
}

impl AdamState {
    fn new(params: &NetworkParams) -> Self {
        Self {
            m_w: params.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect(),
            v_w: params.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect(),
            m_b: params.biases.iter().map(|b| Array1::zeros(b.len())).collect(),
            v_b: params.biases.iter().map(|b| Array1::zeros(b.len())).collect(),
            step: 0,
        }
    }
}

fn adam_update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    config: &NetworkConfig,
    step: i32,
) {
    let (b1, b2) = (config.beta1, config.beta2);
    let bias1 = 1.0 - b1.powi(step);
    let bias2 = 1.0 - b2.powi(step);
    let lr = config.learning_rate;
    let eps = config.epsilon;

    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = b1 * *m + (1.0 - b1) * g;
            *v = b2 * *v + (1.0 - b2) * g * g;
            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *p -= lr * m_hat / (v_hat.sqrt() + eps);
        });
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Binary classification network shared by the FNN and PNN models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryNetwork {
    config: NetworkConfig,
    params: Option<NetworkParams>,
}

impl BinaryNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self { config, params: None }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn params(&self) -> Option<&NetworkParams> {
        self.params.as_ref()
    }

    fn rng(&self) -> Xoshiro256PlusPlus {
        match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        }
    }

    /// Fit with early stopping on the configured validation rows
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        x_val: &Array2<f64>,
        y_val: &Array1<f64>,
        checkpoint: Option<&CheckpointSlot>,
    ) -> Result<FitReport> {
        if x.nrows() != y.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(TrainerError::TrainingError("No training rows".to_string()));
        }
        if self.config.batch_size == 0 {
            return Err(TrainerError::ConfigError("batch_size must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.config.dropout) {
            return Err(TrainerError::ConfigError(format!(
                "dropout must be in [0, 1), got {}",
                self.config.dropout
            )));
        }

        let (x_train, y_train, x_mon, y_mon) = match &self.config.validation {
            ValidationSource::Fold => (x.clone(), y.clone(), x_val.clone(), y_val.clone()),
            ValidationSource::TrainTail { fraction } => {
                let n_val = (x.nrows() as f64 * fraction.clamp(0.0, 1.0)) as usize;
                let split = x.nrows() - n_val;
                (
                    x.slice(ndarray::s![..split, ..]).to_owned(),
                    y.slice(ndarray::s![..split]).to_owned(),
                    x.slice(ndarray::s![split.., ..]).to_owned(),
                    y.slice(ndarray::s![split..]).to_owned(),
                )
            }
        };
        if x_train.nrows() == 0 {
            return Err(TrainerError::TrainingError(
                "Validation split leaves no training rows".to_string(),
            ));
        }
        let monitor_train = x_mon.nrows() == 0;
        if monitor_train {
            warn!("No validation rows available; monitoring training loss instead");
        }

        let mut rng = self.rng();
        let mut layer_sizes = vec![x.ncols()];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(1);

        let mut params = NetworkParams::init(&layer_sizes, &mut rng);
        let mut adam = AdamState::new(&params);
        let mut stopper = EarlyStopping::new(self.config.patience).with_min_delta(self.config.min_delta);
        let mut best: Option<NetworkParams> = None;
        let mut stopped_early = false;
        let mut iterations = 0;

        let n_train = x_train.nrows();
        let mut indices: Vec<usize> = (0..n_train).collect();

        for epoch in 0..self.config.max_epochs {
            indices.shuffle(&mut rng);

            for batch in indices.chunks(self.config.batch_size) {
                let x_batch = x_train.select(Axis(0), batch);
                let y_batch = y_train.select(Axis(0), batch);

                let pass = self.forward(&params, &x_batch, Some(&mut rng));
                let gradients = self.backward(&params, &y_batch, &pass);

                adam.step += 1;
                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    adam_update(&mut params.weights[i], &grad_w, &mut adam.m_w[i], &mut adam.v_w[i], &self.config, adam.step);
                    adam_update(&mut params.biases[i], &grad_b, &mut adam.m_b[i], &mut adam.v_b[i], &self.config, adam.step);
                }
            }
            iterations = epoch + 1;

            let val_loss = if monitor_train {
                log_loss(&y_train, &Self::predict_with(&params, &x_train))
            } else {
                log_loss(&y_mon, &Self::predict_with(&params, &x_mon))
            };
            debug!(epoch, val_loss, "Epoch finished");

            match stopper.observe(epoch, val_loss) {
                StopDecision::Improved => match checkpoint {
                    Some(slot) => slot.save(&params, Some(epoch), Some(val_loss))?,
                    None => best = Some(params.clone()),
                },
                StopDecision::Continue => {}
                StopDecision::Stop => {
                    stopped_early = true;
                    info!(epoch, best_epoch = ?stopper.best_epoch(), "Early stopping");
                    break;
                }
            }
        }

        // Keep the best snapshot, reading it back from disk when checkpointing
        let final_params = match checkpoint {
            Some(slot) if slot.exists() => slot.load::<NetworkParams>()?.params,
            _ => best.unwrap_or(params),
        };
        self.params = Some(final_params);

        Ok(FitReport {
            iterations,
            best_iteration: stopper.best_epoch(),
            best_val_loss: stopper.best_loss(),
            stopped_early,
        })
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let params = self.params.as_ref().ok_or(TrainerError::ModelNotFitted)?;
        if x.ncols() != params.n_inputs() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} features", params.n_inputs()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(Self::predict_with(params, x))
    }

    /// Replace parameters with a stored snapshot
    pub fn restore(&mut self, slot: &CheckpointSlot) -> Result<()> {
        let record = slot.load::<NetworkParams>()?;
        let params = record.params;
        if params.weights.len() != self.config.hidden_layers.len() + 1 {
            return Err(TrainerError::CheckpointError {
                path: slot.path().to_path_buf(),
                reason: format!(
                    "checkpoint has {} layers, configuration expects {}",
                    params.weights.len(),
                    self.config.hidden_layers.len() + 1
                ),
            });
        }
        self.params = Some(params);
        Ok(())
    }

    fn predict_with(params: &NetworkParams, x: &Array2<f64>) -> Array1<f64> {
        let mut a = x.to_owned();
        let last = params.weights.len() - 1;
        for (i, (w, b)) in params.weights.iter().zip(params.biases.iter()).enumerate() {
            let z = a.dot(w) + b;
            a = if i < last { z.mapv(|v| v.max(0.0)) } else { z.mapv(sigmoid) };
        }
        a.column(0).to_owned()
    }

    fn forward(
        &self,
        params: &NetworkParams,
        x: &Array2<f64>,
        mut rng: Option<&mut Xoshiro256PlusPlus>,
    ) -> ForwardPass {
        let last = params.weights.len() - 1;
        let keep = 1.0 - self.config.dropout;

        let mut activations = vec![x.clone()];
        let mut pre_activations = Vec::with_capacity(params.weights.len());
        let mut masks = Vec::with_capacity(last);

        for (i, (w, b)) in params.weights.iter().zip(params.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;

            let a = if i < last {
                let mut a = z.mapv(|v| v.max(0.0));
                let mask = match rng.as_deref_mut() {
                    Some(rng) if self.config.dropout > 0.0 => {
                        let mask = Array2::from_shape_fn(a.raw_dim(), |_| {
                            if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 }
                        });
                        a = a * &mask;
                        Some(mask)
                    }
                    _ => None,
                };
                masks.push(mask);
                a
            } else {
                z.mapv(sigmoid)
            };

            pre_activations.push(z);
            activations.push(a);
        }

        ForwardPass {
            activations,
            pre_activations,
            masks,
        }
    }

    fn backward(
        &self,
        params: &NetworkParams,
        y: &Array1<f64>,
        pass: &ForwardPass,
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y.len() as f64;
        let mut gradients = Vec::with_capacity(params.weights.len());

        // Sigmoid + cross-entropy gradient w.r.t. the output logit
        let y_2d = y.clone().insert_axis(Axis(1));
        let output = &pass.activations[pass.activations.len() - 1];
        let mut delta = (output - &y_2d) / n;

        for i in (0..params.weights.len()).rev() {
            let a_prev = &pass.activations[i];

            let mut grad_w = a_prev.t().dot(&delta);
            if self.config.l2_reg > 0.0 {
                grad_w = grad_w + &params.weights[i] * self.config.l2_reg;
            }
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                let relu_grad = pass.pre_activations[i - 1].mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                let mut next = delta.dot(&params.weights[i].t()) * relu_grad;
                if let Some(mask) = &pass.masks[i - 1] {
                    next = next * mask;
                }
                delta = next;
            }
        }

        gradients.reverse();
        gradients
    }
}

/// Feed-forward network over the raw feature vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FnnClassifier {
    network: BinaryNetwork,
}

impl FnnClassifier {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            network: BinaryNetwork::new(config),
        }
    }

    pub fn network(&self) -> &BinaryNetwork {
        &self.network
    }
}

impl Model for FnnClassifier {
    fn tag(&self) -> &'static str {
        "fnn"
    }

    fn fit(&mut self, train: &FoldData, val: &FoldData, checkpoint: Option<&CheckpointSlot>) -> Result<FitReport> {
        self.network.fit(&train.x, &train.y, &val.x, &val.y, checkpoint)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.network.predict_proba(x)
    }

    fn supports_checkpoint(&self) -> bool {
        true
    }

    fn restore(&mut self, slot: &CheckpointSlot) -> Result<()> {
        self.network.restore(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::roc_auc_score;
    use crate::training::checkpoint::{CheckpointStore, FeatureFingerprint};
    use crate::training::models::train_or_load;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2),
            (0..200).map(|i| ((i * 37) % 100) as f64 / 100.0).collect()
        ).unwrap();

        let y: Array1<f64> = x.rows().into_iter()
            .map(|row| if row[0] + row[1] > 1.0 { 1.0 } else { 0.0 })
            .collect();

        (x, y)
    }

    fn small_config() -> NetworkConfig {
        NetworkConfig {
            hidden_layers: vec![16, 8],
            dropout: 0.1,
            learning_rate: 0.01,
            batch_size: 32,
            max_epochs: 150,
            patience: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_network_learns_separable_data() {
        let (x, y) = create_classification_data();
        let mut net = BinaryNetwork::new(small_config());
        let report = net.fit(&x, &y, &x, &y, None).unwrap();
        assert!(report.iterations > 0);
        assert!(report.best_val_loss.is_some());

        let proba = net.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 100);
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));

        let auc = roc_auc_score(&y, &proba).unwrap();
        assert!(auc > 0.9, "AUC ({}) should be above 0.9", auc);
    }

    #[test]
    fn test_predict_before_fit() {
        let net = BinaryNetwork::new(NetworkConfig::default());
        let x = Array2::zeros((2, 3));
        assert!(matches!(net.predict_proba(&x), Err(TrainerError::ModelNotFitted)));
    }

    #[test]
    fn test_early_stopping_bounds_epochs() {
        let (x, y) = create_classification_data();
        // Validation labels unrelated to the inputs: the loss stops improving quickly
        let y_noise: Array1<f64> = (0..100).map(|i| (i % 2) as f64).collect();
        let mut net = BinaryNetwork::new(NetworkConfig {
            patience: 3,
            max_epochs: 500,
            ..small_config()
        });
        let report = net.fit(&x, &y, &x, &y_noise, None).unwrap();
        assert!(report.stopped_early);
        assert!(report.iterations < 500);
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let (x, y) = create_classification_data();
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let fp = FeatureFingerprint::from_names(&["a".to_string(), "b".to_string()]);
        let slot = store.slot("fnn", 0, fp);

        let mut trained = FnnClassifier::new(NetworkConfig { max_epochs: 20, ..small_config() });
        let train = FoldData { x: x.clone(), y: y.clone() };
        trained.fit(&train, &train, Some(&slot)).unwrap();
        assert!(slot.exists());

        let mut restored = FnnClassifier::new(NetworkConfig { max_epochs: 20, ..small_config() });
        restored.restore(&slot).unwrap();

        let a = trained.predict_proba(&x).unwrap();
        let b = restored.predict_proba(&x).unwrap();
        for (pa, pb) in a.iter().zip(b.iter()) {
            assert!((pa - pb).abs() < 1e-12);
        }
    }

    #[test]
    fn test_restore_with_other_architecture_fails() {
        let (x, y) = create_classification_data();
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let fp = FeatureFingerprint::from_names(&["a".to_string(), "b".to_string()]);
        let slot = store.slot("fnn", 3, fp);

        let train = FoldData { x: x.clone(), y: y.clone() };
        let mut trained = FnnClassifier::new(NetworkConfig { max_epochs: 5, ..small_config() });
        trained.fit(&train, &train, Some(&slot)).unwrap();

        let mut other = FnnClassifier::new(NetworkConfig {
            hidden_layers: vec![8],
            ..small_config()
        });
        let err = train_or_load(&mut other, Some(&slot), &train, &train).unwrap_err();
        assert!(matches!(err, TrainerError::CheckpointError { .. }));
        assert!(matches!(other.predict_proba(&x), Err(TrainerError::ModelNotFitted)));
    }

    #[test]
    fn test_train_tail_validation() {
        let (x, y) = create_classification_data();
        let mut net = BinaryNetwork::new(NetworkConfig {
            validation: ValidationSource::TrainTail { fraction: 0.2 },
            max_epochs: 10,
            ..small_config()
        });
        let empty_x = Array2::zeros((0, 2));
        let empty_y = Array1::zeros(0);
        let report = net.fit(&x, &y, &empty_x, &empty_y, None).unwrap();
        assert_eq!(report.iterations, 10);
    }

    #[test]
    fn test_invalid_dropout_rejected() {
        let (x, y) = create_classification_data();
        let mut net = BinaryNetwork::new(NetworkConfig { dropout: 1.0, ..small_config() });
        assert!(matches!(
            net.fit(&x, &y, &x, &y, None),
            Err(TrainerError::ConfigError(_))
        ));
    }
}
