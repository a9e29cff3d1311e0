//! Evaluation metrics
//!
//! - [`roc_auc_score`] - ranking quality of predicted probabilities
//! - [`roc_curve`] - ROC points for diagnostics export
//! - [`grouped_auc`] - mean AUC over groups (e.g. per coupon)
//! - [`log_loss`] - binary cross-entropy, the early stopping monitor

mod roc;

pub use roc::{grouped_auc, roc_auc_score, roc_curve, RocCurve};

use ndarray::Array1;

const EPS: f64 = 1e-7;

/// Mean binary cross-entropy with probabilities clipped away from 0 and 1
pub fn log_loss(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true
        .iter()
        .zip(y_prob.iter())
        .map(|(&y, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / y_true.len() as f64
}
