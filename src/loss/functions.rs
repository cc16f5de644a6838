use ndarray::{Array1, ArrayView1};

/// Trait defining the interface for loss functions
pub trait Loss: Send + Sync {
    /// Mean loss over a batch of predictions and targets
    fn compute_batch(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32;

    /// Gradient of the mean batch loss with respect to each prediction
    fn gradient_batch(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32>;
}

/// Huber loss (smooth L1).
///
/// Quadratic for errors inside `[-delta, delta]`, linear beyond, so the
/// gradient magnitude of any single TD error is bounded by `delta`. With
/// `delta = 1` this is the clipped error term of DQN.
#[derive(Clone, Copy, Debug)]
pub struct HuberLoss {
    pub delta: f32,
}

impl HuberLoss {
    pub fn new(delta: f32) -> Self {
        HuberLoss { delta }
    }
}

impl Default for HuberLoss {
    fn default() -> Self {
        HuberLoss::new(1.0)
    }
}

impl Loss for HuberLoss {
    fn compute_batch(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32 {
        let diff = &predictions - &targets;
        let batch_size = predictions.len() as f32;
        diff.mapv(|x| {
            let abs_x = x.abs();
            if abs_x <= self.delta {
                0.5 * x * x
            } else {
                self.delta * abs_x - 0.5 * self.delta * self.delta
            }
        }).sum() / batch_size
    }

    fn gradient_batch(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32> {
        let diff = &predictions - &targets;
        let batch_size = predictions.len() as f32;
        diff.mapv(|x| {
            if x.abs() <= self.delta {
                x
            } else {
                self.delta * x.signum()
            }
        }) / batch_size
    }
}
