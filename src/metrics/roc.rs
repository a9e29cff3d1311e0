//! ROC analysis for binary classifiers

use crate::error::{Result, TrainerError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Points of a receiver operating characteristic curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocCurve {
    /// False positive rate at each threshold
    pub fpr: Vec<f64>,
    /// True positive rate at each threshold
    pub tpr: Vec<f64>,
    /// Decreasing score thresholds; the first one is `+inf`
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Area under the curve by the trapezoidal rule
    pub fn area(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(f, t)| (f[1] - f[0]) * (t[1] + t[0]) / 2.0)
            .sum()
    }
}

/// Count positives and negatives, rejecting anything that is not a 0/1 label.
fn class_balance(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<(usize, usize)> {
    if y_true.len() != y_score.len() {
        return Err(TrainerError::ShapeError {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", y_score.len()),
        });
    }
    if y_true.is_empty() {
        return Err(TrainerError::ValidationError(
            "ROC AUC is undefined for an empty label vector".to_string(),
        ));
    }
    if y_score.iter().any(|s| s.is_nan()) {
        return Err(TrainerError::ValidationError(
            "Prediction scores contain NaN".to_string(),
        ));
    }

    let mut n_pos = 0;
    let mut n_neg = 0;
    for &label in y_true.iter() {
        if label == 1.0 {
            n_pos += 1;
        } else if label == 0.0 {
            n_neg += 1;
        } else {
            return Err(TrainerError::ValidationError(format!(
                "ROC AUC expects binary labels in {{0, 1}}, found {}",
                label
            )));
        }
    }

    if n_pos == 0 || n_neg == 0 {
        return Err(TrainerError::ValidationError(
            "Only one class present in y_true; ROC AUC is not defined".to_string(),
        ));
    }

    Ok((n_pos, n_neg))
}

/// Area under the ROC curve.
///
/// Computed as the Mann-Whitney U statistic with average ranks for tied
/// scores, i.e. the probability that a random positive is scored above a
/// random negative (ties count one half).
pub fn roc_auc_score(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<f64> {
    let (n_pos, n_neg) = class_balance(y_true, y_score)?;

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[a].partial_cmp(&y_score[b]).unwrap_or(Ordering::Equal));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_score[order[end]] == y_score[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end share their mean
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            if y_true[idx] == 1.0 {
                rank_sum_pos += avg_rank;
            }
        }
        start = end;
    }

    let n_pos_f = n_pos as f64;
    let u = rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0;
    Ok(u / (n_pos_f * n_neg as f64))
}

/// Compute the ROC curve at every distinct score
pub fn roc_curve(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<RocCurve> {
    let (n_pos, n_neg) = class_balance(y_true, y_score)?;

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[b].partial_cmp(&y_score[a]).unwrap_or(Ordering::Equal));

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];

    let mut tp = 0usize;
    let mut fp = 0usize;
    for (pos, &idx) in order.iter().enumerate() {
        if y_true[idx] == 1.0 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_tie = pos + 1 == order.len() || y_score[order[pos + 1]] != y_score[idx];
        if last_of_tie {
            fpr.push(fp as f64 / n_neg as f64);
            tpr.push(tp as f64 / n_pos as f64);
            thresholds.push(y_score[idx]);
        }
    }

    Ok(RocCurve { fpr, tpr, thresholds })
}

/// Mean of per-group AUCs.
///
/// Groups whose labels are all one class have no AUC and are skipped.
/// Returns `None` when no group has both classes.
pub fn grouped_auc(
    y_true: &Array1<f64>,
    y_score: &Array1<f64>,
    groups: &Array1<i64>,
) -> Result<Option<f64>> {
    if groups.len() != y_true.len() || y_score.len() != y_true.len() {
        return Err(TrainerError::ShapeError {
            expected: format!("{} labels, scores and groups", y_true.len()),
            actual: format!("{} scores, {} groups", y_score.len(), groups.len()),
        });
    }

    let mut members: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &g) in groups.iter().enumerate() {
        members.entry(g).or_default().push(i);
    }

    let mut aucs = Vec::new();
    for indices in members.values() {
        let labels: Array1<f64> = indices.iter().map(|&i| y_true[i]).collect();
        let has_pos = labels.iter().any(|&v| v == 1.0);
        let has_neg = labels.iter().any(|&v| v == 0.0);
        if !(has_pos && has_neg) {
            continue;
        }
        let scores: Array1<f64> = indices.iter().map(|&i| y_score[i]).collect();
        aucs.push(roc_auc_score(&labels, &scores)?);
    }

    if aucs.is_empty() {
        return Ok(None);
    }
    Ok(Some(aucs.iter().sum::<f64>() / aucs.len() as f64))
}
