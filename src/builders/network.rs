use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::activations::Activation;
use crate::config::TrainerConfig;
use crate::error::{DqnError, Result};
use crate::network::{Architecture, ValueNetworkPair};
use crate::optimizer::{Adam, GradientClipper, OptimizerConfig, OptimizerWrapper, RMSProp, SGD};

/// Builder for constructing an online/target network pair with a fluent API
pub struct ValueNetworkPairBuilder {
    input_dim: Option<usize>,
    num_actions: Option<usize>,
    hidden_layers: Vec<usize>,
    hidden_activation: Activation,
    optimizer: Option<OptimizerWrapper>,
    learning_rate: f32,
    clipper: GradientClipper,
    seed: Option<u64>,
}

impl ValueNetworkPairBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        ValueNetworkPairBuilder {
            input_dim: None,
            num_actions: None,
            hidden_layers: vec![512],
            hidden_activation: Activation::Relu,
            optimizer: None,
            learning_rate: 0.00025,
            clipper: GradientClipper::None,
            seed: None,
        }
    }

    /// Start from the network-related settings of a trainer config
    pub fn from_config(config: &TrainerConfig) -> Self {
        let mut builder = Self::new()
            .hidden_layers(&config.hidden_layers)
            .learning_rate(config.learning_rate)
            .with_optimizer_config(&config.optimizer);
        if let Some(max_norm) = config.max_grad_norm {
            builder = builder.gradient_clipper(GradientClipper::ClipByGlobalNorm { max_norm });
        }
        if let Some(seed) = config.seed {
            builder = builder.seed(seed);
        }
        builder
    }

    pub fn input_dim(mut self, input_dim: usize) -> Self {
        self.input_dim = Some(input_dim);
        self
    }

    pub fn num_actions(mut self, num_actions: usize) -> Self {
        self.num_actions = Some(num_actions);
        self
    }

    pub fn hidden_layers(mut self, widths: &[usize]) -> Self {
        self.hidden_layers = widths.to_vec();
        self
    }

    pub fn hidden_activation(mut self, activation: Activation) -> Self {
        self.hidden_activation = activation;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the optimizer to SGD
    pub fn with_sgd(mut self) -> Self {
        self.optimizer = Some(OptimizerWrapper::SGD(SGD::new()));
        self
    }

    /// Set the optimizer to Adam
    pub fn with_adam(mut self, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        self.optimizer = Some(OptimizerWrapper::Adam(Adam::new(beta1, beta2, epsilon)));
        self
    }

    /// Set the optimizer to RMSProp
    pub fn with_rmsprop(mut self, decay: f32, epsilon: f32) -> Self {
        self.optimizer = Some(OptimizerWrapper::RMSProp(RMSProp::new(decay, epsilon)));
        self
    }

    pub fn with_optimizer_config(mut self, config: &OptimizerConfig) -> Self {
        self.optimizer = Some(OptimizerWrapper::from_config(config));
        self
    }

    pub fn gradient_clipper(mut self, clipper: GradientClipper) -> Self {
        self.clipper = clipper;
        self
    }

    /// Seed weight initialization
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the network pair
    pub fn build(self) -> Result<ValueNetworkPair> {
        let input_dim = self.input_dim.ok_or_else(|| {
            DqnError::invalid_parameter("input_dim", "input width not specified")
        })?;
        let num_actions = self.num_actions.ok_or_else(|| {
            DqnError::invalid_parameter("num_actions", "action count not specified")
        })?;

        let architecture = Architecture::new(input_dim, &self.hidden_layers, num_actions)
            .with_hidden_activation(self.hidden_activation);
        let optimizer = self.optimizer
            .unwrap_or_else(|| OptimizerWrapper::from_config(&OptimizerConfig::default()));
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(ValueNetworkPair::new(architecture, optimizer, self.learning_rate, &mut rng)?
            .with_gradient_clipper(self.clipper))
    }
}

impl Default for ValueNetworkPairBuilder {
    fn default() -> Self {
        Self::new()
    }
}
