use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Regression loss between predicted and target Q-values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LossKind {
    /// Mean squared error
    Mse,
    /// Huber loss (smooth L1)
    Huber { delta: f32 },
}

impl Default for LossKind {
    fn default() -> Self {
        LossKind::Huber { delta: 1.0 }
    }
}

impl LossKind {
    /// Mean loss over every element of the batch.
    pub fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        let diff = &predictions - &targets;
        let n = diff.len().max(1) as f32;
        match *self {
            LossKind::Mse => diff.mapv(|x| x * x).sum() / n,
            LossKind::Huber { delta } => {
                diff.mapv(|x| {
                    let abs_x = x.abs();
                    if abs_x <= delta {
                        0.5 * x * x
                    } else {
                        delta * abs_x - 0.5 * delta * delta
                    }
                })
                .sum()
                    / n
            }
        }
    }

    /// Gradient of [`LossKind::compute_batch`] with respect to predictions.
    pub fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        let diff = &predictions - &targets;
        let n = diff.len().max(1) as f32;
        match *self {
            LossKind::Mse => diff.mapv(|x| 2.0 * x / n),
            LossKind::Huber { delta } => diff.mapv(|x| x.clamp(-delta, delta) / n),
        }
    }
}
