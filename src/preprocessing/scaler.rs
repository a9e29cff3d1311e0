//! Min-max feature scaling

use crate::error::{Result, TrainerError};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Fitted range of one column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnRange {
    min: f64,
    range: f64,
}

/// Column-wise min-max scaler: (x - min) / (max - min)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinMaxScaler {
    params: Option<Vec<ColumnRange>>,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let min = col.iter().copied().fold(f64::INFINITY, f64::min);
                let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                ColumnRange {
                    min: if min.is_finite() { min } else { 0.0 },
                    range: if range > 0.0 && range.is_finite() { range } else { 1.0 },
                }
            })
            .collect();

        self.params = Some(params);
        Ok(self)
    }

    /// Transform data using fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(TrainerError::ModelNotFitted)?;
        if x.ncols() != params.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} columns", params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(params.iter()) {
            col.mapv_inplace(|v| (v - p.min) / p.range);
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}
