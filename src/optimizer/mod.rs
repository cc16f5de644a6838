pub mod gradient_clipper;

use ndarray::{Array1, Array2};
use serde::{Serialize, Deserialize};

use crate::layers::{DenseLayer, LayerGradients};

pub use gradient_clipper::GradientClipper;

/// Applies one gradient step to a full parameter set.
///
/// Optimizers with per-parameter state (moment estimates) key that state by
/// layer index, so the same optimizer must always be stepped with the same
/// layer list.
pub trait Optimizer {
    fn step(&mut self, layers: &mut [DenseLayer], gradients: &[LayerGradients], learning_rate: f32);
}

/// Serializable choice of optimizer and its hyperparameters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd,
    Adam { beta1: f32, beta2: f32, epsilon: f32 },
    RmsProp { decay: f32, epsilon: f32 },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::RmsProp { decay: 0.95, epsilon: 0.01 }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
    RMSProp(RMSProp),
}

impl OptimizerWrapper {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        match *config {
            OptimizerConfig::Sgd => OptimizerWrapper::SGD(SGD::new()),
            OptimizerConfig::Adam { beta1, beta2, epsilon } => {
                OptimizerWrapper::Adam(Adam::new(beta1, beta2, epsilon))
            }
            OptimizerConfig::RmsProp { decay, epsilon } => {
                OptimizerWrapper::RMSProp(RMSProp::new(decay, epsilon))
            }
        }
    }
}

impl Optimizer for OptimizerWrapper {
    fn step(&mut self, layers: &mut [DenseLayer], gradients: &[LayerGradients], learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.step(layers, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.step(layers, gradients, learning_rate),
            OptimizerWrapper::RMSProp(optimizer) => optimizer.step(layers, gradients, learning_rate),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Default for SGD {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for SGD {
    fn step(&mut self, layers: &mut [DenseLayer], gradients: &[LayerGradients], learning_rate: f32) {
        for (layer, grad) in layers.iter_mut().zip(gradients) {
            layer.weights.zip_mut_with(&grad.weights, |w, &g| *w -= learning_rate * g);
            layer.biases.zip_mut_with(&grad.biases, |b, &g| *b -= learning_rate * g);
        }
    }
}

/// First/second moment buffers for one layer.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct Moments {
    weights: Array2<f32>,
    biases: Array1<f32>,
}

impl Moments {
    fn zeros_like(layer: &DenseLayer) -> Self {
        Moments {
            weights: Array2::zeros(layer.weights.dim()),
            biases: Array1::zeros(layer.biases.dim()),
        }
    }

    fn matches(&self, layer: &DenseLayer) -> bool {
        self.weights.dim() == layer.weights.dim() && self.biases.dim() == layer.biases.dim()
    }
}

fn ensure_state(state: &mut Vec<Moments>, layers: &[DenseLayer]) {
    let stale = state.len() != layers.len()
        || state.iter().zip(layers).any(|(m, l)| !m.matches(l));
    if stale {
        *state = layers.iter().map(Moments::zeros_like).collect();
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m: Vec<Moments>,
    v: Vec<Moments>,
    pub t: i32,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn step(&mut self, layers: &mut [DenseLayer], gradients: &[LayerGradients], learning_rate: f32) {
        ensure_state(&mut self.m, layers);
        ensure_state(&mut self.v, layers);
        self.t += 1;

        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.epsilon);
        let bias1 = 1.0 - beta1.powi(self.t);
        let bias2 = 1.0 - beta2.powi(self.t);

        for (i, (layer, grad)) in layers.iter_mut().zip(gradients).enumerate() {
            let (m, v) = (&mut self.m[i], &mut self.v[i]);

            m.weights.zip_mut_with(&grad.weights, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
            v.weights.zip_mut_with(&grad.weights, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);
            m.biases.zip_mut_with(&grad.biases, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
            v.biases.zip_mut_with(&grad.biases, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

            ndarray::Zip::from(&mut layer.weights).and(&m.weights).and(&v.weights)
                .for_each(|w, &m, &v| *w -= learning_rate * (m / bias1) / ((v / bias2).sqrt() + eps));
            ndarray::Zip::from(&mut layer.biases).and(&m.biases).and(&v.biases)
                .for_each(|b, &m, &v| *b -= learning_rate * (m / bias1) / ((v / bias2).sqrt() + eps));
        }
    }
}

/// RMSProp optimizer
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RMSProp {
    pub decay: f32,
    pub epsilon: f32,
    v: Vec<Moments>,
}

impl RMSProp {
    pub fn new(decay: f32, epsilon: f32) -> Self {
        RMSProp {
            decay,
            epsilon,
            v: Vec::new(),
        }
    }
}

impl Default for RMSProp {
    fn default() -> Self {
        Self::new(0.95, 0.01)
    }
}

impl Optimizer for RMSProp {
    fn step(&mut self, layers: &mut [DenseLayer], gradients: &[LayerGradients], learning_rate: f32) {
        ensure_state(&mut self.v, layers);
        let (decay, eps) = (self.decay, self.epsilon);

        for (i, (layer, grad)) in layers.iter_mut().zip(gradients).enumerate() {
            let v = &mut self.v[i];

            // Update moving average of squared gradients
            v.weights.zip_mut_with(&grad.weights, |v, &g| *v = decay * *v + (1.0 - decay) * g * g);
            v.biases.zip_mut_with(&grad.biases, |v, &g| *v = decay * *v + (1.0 - decay) * g * g);

            ndarray::Zip::from(&mut layer.weights).and(&grad.weights).and(&v.weights)
                .for_each(|w, &g, &v| *w -= learning_rate * g / (v.sqrt() + eps));
            ndarray::Zip::from(&mut layer.biases).and(&grad.biases).and(&v.biases)
                .for_each(|b, &g, &v| *b -= learning_rate * g / (v.sqrt() + eps));
        }
    }
}
