//! Early stopping on a monitored validation loss

use serde::{Deserialize, Serialize};

/// Decision after observing one epoch's validation loss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    /// The loss improved on the best seen so far; snapshot the parameters
    Improved,
    /// No improvement, patience not exhausted yet
    Continue,
    /// Patience exhausted
    Stop,
}

/// Patience-based early stopping (lower loss is better)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyStopping {
    pub patience: usize,
    pub min_delta: f64,
    #[serde(skip)]
    counter: usize,
    #[serde(skip)]
    best_loss: Option<f64>,
    #[serde(skip)]
    best_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            min_delta: 0.0,
            counter: 0,
            best_loss: None,
            best_epoch: None,
        }
    }

    pub fn with_min_delta(mut self, min_delta: f64) -> Self {
        self.min_delta = min_delta;
        self
    }

    pub fn observe(&mut self, epoch: usize, loss: f64) -> StopDecision {
        let improved = match self.best_loss {
            None => !loss.is_nan(),
            Some(best) => loss < best - self.min_delta,
        };

        if improved {
            self.best_loss = Some(loss);
            self.best_epoch = Some(epoch);
            self.counter = 0;
            return StopDecision::Improved;
        }

        self.counter += 1;
        if self.counter >= self.patience {
            StopDecision::Stop
        } else {
            StopDecision::Continue
        }
    }

    pub fn best_loss(&self) -> Option<f64> {
        self.best_loss
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}
