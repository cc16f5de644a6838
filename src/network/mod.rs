//! # Q-Value Network
//!
//! A multilayer perceptron mapping a flattened observation to one value per
//! discrete action. The network is split into two parts:
//!
//! - [`Architecture`]: the shape definition (input width, hidden widths,
//!   number of actions, hidden activation), shared by every parameter set
//! - [`Parameters`]: one independent set of layer weights and biases
//!
//! [`ValueNetworkPair`] owns one architecture and two parameter sets, the
//! online and the target network. The only way values move between them is
//! [`copy_parameters`].

mod pair;

use ndarray::{Array2, ArrayView2};
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activations::Activation;
use crate::error::{DqnError, Result};
use crate::layers::{DenseLayer, LayerCache, LayerGradients, WeightInit};

pub use pair::{NetworkId, ValueApproximator, ValueNetworkPair};

/// Shape definition shared by the online and target networks.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Architecture {
    pub input_dim: usize,
    pub hidden_layers: Vec<usize>,
    pub num_actions: usize,
    pub hidden_activation: Activation,
}

impl Architecture {
    /// ReLU hidden layers, linear output.
    pub fn new(input_dim: usize, hidden_layers: &[usize], num_actions: usize) -> Self {
        Architecture {
            input_dim,
            hidden_layers: hidden_layers.to_vec(),
            num_actions,
            hidden_activation: Activation::Relu,
        }
    }

    pub fn with_hidden_activation(mut self, activation: Activation) -> Self {
        self.hidden_activation = activation;
        self
    }

    /// Layer widths from input to output, e.g. `[input, h1, h2, actions]`.
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(self.input_dim);
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(self.num_actions);
        sizes
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(DqnError::invalid_parameter("input_dim", "must be greater than 0"));
        }
        if self.num_actions == 0 {
            return Err(DqnError::invalid_parameter("num_actions", "must be greater than 0"));
        }
        if self.hidden_layers.iter().any(|&w| w == 0) {
            return Err(DqnError::invalid_parameter("hidden_layers", "widths must be greater than 0"));
        }
        Ok(())
    }

    /// Draw a fresh parameter set for this architecture.
    pub fn initialize<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Parameters> {
        self.validate()?;
        let sizes = self.layer_sizes();
        let last = sizes.len() - 2;

        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, window)| {
                let activation = if i == last { Activation::Linear } else { self.hidden_activation };
                DenseLayer::new(window[0], window[1], activation, WeightInit::for_activation(activation), &mut *rng)
            })
            .collect();

        Ok(Parameters { layers })
    }
}

/// One independent set of network weights.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Parameters {
    layers: Vec<DenseLayer>,
}

impl Parameters {
    /// Wrap explicit layers. Consecutive layers must chain.
    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(DqnError::invalid_parameter("layers", "network must have at least one layer"));
        }
        for pair in layers.windows(2) {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(DqnError::dimension_mismatch(
                    format!("layer input width {}", pair[0].output_size()),
                    format!("{}", pair[1].input_size()),
                ));
            }
        }
        Ok(Parameters { layers })
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size()
    }

    /// Batched forward pass, one row per state.
    pub fn forward(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut current = inputs.to_owned();
        for layer in &self.layers {
            current = layer.forward_batch(current.view());
        }
        current
    }

    /// Forward pass that keeps per-layer caches for [`Parameters::backward`].
    pub fn forward_with_cache(&self, inputs: ArrayView2<f32>) -> (Array2<f32>, Vec<LayerCache>) {
        let mut caches = Vec::with_capacity(self.layers.len());
        let mut current = inputs.to_owned();
        for layer in &self.layers {
            let (output, cache) = layer.forward_with_cache(current.view());
            caches.push(cache);
            current = output;
        }
        (current, caches)
    }

    /// Backpropagate output errors; gradients are returned input layer first.
    pub fn backward(&self, caches: &[LayerCache], output_errors: ArrayView2<f32>) -> Vec<LayerGradients> {
        let mut gradients = Vec::with_capacity(self.layers.len());
        let mut current_error = output_errors.to_owned();

        for (layer, cache) in self.layers.iter().zip(caches).rev() {
            let (input_error, grads) = layer.backward_batch(cache, current_error.view());
            gradients.push(grads);
            current_error = input_error;
        }

        gradients.reverse();
        gradients
    }

    pub fn is_finite(&self) -> bool {
        self.layers.iter().all(DenseLayer::is_finite)
    }

    /// True when both parameter sets have identical layer shapes.
    pub fn same_shape(&self, other: &Parameters) -> bool {
        self.layers.len() == other.layers.len()
            && self.layers.iter().zip(&other.layers).all(|(a, b)| {
                a.weights.dim() == b.weights.dim() && a.biases.dim() == b.biases.dim()
            })
    }
}

/// Overwrite `dst` with an exact copy of `src`.
///
/// Values are assigned into `dst`'s existing buffers; the two parameter sets
/// never share storage.
pub fn copy_parameters(src: &Parameters, dst: &mut Parameters) -> Result<()> {
    if !src.same_shape(dst) {
        return Err(DqnError::dimension_mismatch(
            format!("{} layers with matching shapes", src.layers.len()),
            format!("{} layers", dst.layers.len()),
        ));
    }
    for (d, s) in dst.layers.iter_mut().zip(&src.layers) {
        d.assign_from(s);
    }
    Ok(())
}
