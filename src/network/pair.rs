use std::path::Path;

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{DqnError, Result};
use crate::loss::{HuberLoss, Loss};
use crate::optimizer::{GradientClipper, Optimizer, OptimizerWrapper};
use super::{copy_parameters, Architecture, Parameters};

/// Selects which parameter set an evaluation reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkId {
    Online,
    Target,
}

/// Contract between the training loop and a Q-value function approximator.
///
/// Implementors hold two parameter sets. Only [`ValueApproximator::update`]
/// may change the online set and only [`ValueApproximator::sync_target`] may
/// change the target set.
pub trait ValueApproximator {
    /// Width of one flattened state row.
    fn state_dim(&self) -> usize;

    /// Size of the discrete action set.
    fn num_actions(&self) -> usize;

    /// Per-action values for each state row. Side-effect free.
    fn evaluate(&self, network: NetworkId, states: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// One gradient step on the online network toward per-sample targets for
    /// the taken actions. Returns the batch loss.
    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32>;

    /// Overwrite the target parameters with an exact copy of the online ones.
    fn sync_target(&mut self) -> Result<()>;

    /// Per-action values for a single state.
    fn evaluate_one(&self, network: NetworkId, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        let batch = state.insert_axis(ndarray::Axis(0));
        let values = self.evaluate(network, batch)?;
        Ok(values.row(0).to_owned())
    }
}

/// MLP online/target network pair trained with the Huber TD loss.
///
/// # Example
///
/// ```rust
/// use deepq::network::{Architecture, NetworkId, ValueApproximator, ValueNetworkPair};
/// use deepq::optimizer::{OptimizerWrapper, SGD};
/// use ndarray::array;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let arch = Architecture::new(4, &[16], 2);
/// let mut pair = ValueNetworkPair::new(arch, OptimizerWrapper::SGD(SGD::new()), 0.01, &mut rng).unwrap();
///
/// let states = array![[0.1, -0.2, 0.3, 0.0]];
/// let loss = pair.update(states.view(), &[1], array![1.0].view()).unwrap();
/// assert!(loss.is_finite());
///
/// // the target network is untouched until the next sync
/// assert_ne!(pair.online(), pair.target());
/// pair.sync_target().unwrap();
/// assert_eq!(pair.online(), pair.target());
/// # let _ = pair.evaluate(NetworkId::Target, states.view()).unwrap();
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ValueNetworkPair {
    architecture: Architecture,
    online: Parameters,
    target: Parameters,
    optimizer: OptimizerWrapper,
    clipper: GradientClipper,
    pub learning_rate: f32,
    #[serde(skip)]
    loss: HuberLoss,
    updates: usize,
    syncs: usize,
}

impl ValueNetworkPair {
    /// Initialize the online network and start the target as an exact copy.
    pub fn new<R: Rng + ?Sized>(
        architecture: Architecture,
        optimizer: OptimizerWrapper,
        learning_rate: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let online = architecture.initialize(rng)?;
        Self::from_parameters(architecture, online, optimizer, learning_rate)
    }

    /// Build from an explicit online parameter set.
    pub fn from_parameters(
        architecture: Architecture,
        online: Parameters,
        optimizer: OptimizerWrapper,
        learning_rate: f32,
    ) -> Result<Self> {
        architecture.validate()?;
        if online.input_dim() != architecture.input_dim || online.output_dim() != architecture.num_actions {
            return Err(DqnError::dimension_mismatch(
                format!("{} -> {}", architecture.input_dim, architecture.num_actions),
                format!("{} -> {}", online.input_dim(), online.output_dim()),
            ));
        }
        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            return Err(DqnError::invalid_parameter("learning_rate", "must be positive and finite"));
        }

        // clone allocates fresh buffers, the two sets never alias
        let target = online.clone();

        Ok(ValueNetworkPair {
            architecture,
            online,
            target,
            optimizer,
            clipper: GradientClipper::None,
            learning_rate,
            loss: HuberLoss::default(),
            updates: 0,
            syncs: 0,
        })
    }

    pub fn with_gradient_clipper(mut self, clipper: GradientClipper) -> Self {
        self.clipper = clipper;
        self
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    pub fn online(&self) -> &Parameters {
        &self.online
    }

    pub fn target(&self) -> &Parameters {
        &self.target
    }

    /// Number of online updates applied so far.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Number of target syncs performed so far.
    pub fn syncs(&self) -> usize {
        self.syncs
    }

    /// Mutable access to the online parameters, e.g. to load pretrained weights.
    pub fn online_mut(&mut self) -> &mut Parameters {
        &mut self.online
    }

    /// Save the pair (both parameter sets and optimizer state) to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = bincode::serialize(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Load a pair from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        let pair: Self = bincode::deserialize(&data)?;
        if !pair.online.same_shape(&pair.target) {
            return Err(DqnError::Serialization("online and target shapes differ".to_string()));
        }
        Ok(pair)
    }

    fn check_states(&self, states: ArrayView2<f32>) -> Result<()> {
        if states.ncols() != self.architecture.input_dim {
            return Err(DqnError::dimension_mismatch(
                format!("state width {}", self.architecture.input_dim),
                format!("{}", states.ncols()),
            ));
        }
        Ok(())
    }
}

impl ValueApproximator for ValueNetworkPair {
    fn state_dim(&self) -> usize {
        self.architecture.input_dim
    }

    fn num_actions(&self) -> usize {
        self.architecture.num_actions
    }

    fn evaluate(&self, network: NetworkId, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_states(states)?;
        let params = match network {
            NetworkId::Online => &self.online,
            NetworkId::Target => &self.target,
        };
        let values = params.forward(states);
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DqnError::NumericInstability(format!("{:?} network produced non-finite Q-values", network)));
        }
        Ok(values)
    }

    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32> {
        self.check_states(states)?;
        let batch_size = states.nrows();
        if batch_size == 0 {
            return Err(DqnError::invalid_parameter("states", "batch must not be empty"));
        }
        if actions.len() != batch_size || targets.len() != batch_size {
            return Err(DqnError::dimension_mismatch(
                format!("{} actions and targets", batch_size),
                format!("{} actions, {} targets", actions.len(), targets.len()),
            ));
        }
        let num_actions = self.architecture.num_actions;
        if let Some(&action) = actions.iter().find(|&&a| a >= num_actions) {
            return Err(DqnError::InvalidAction { action, num_actions });
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(DqnError::NumericInstability("non-finite TD target".to_string()));
        }

        let (q_values, caches) = self.online.forward_with_cache(states);
        let predicted: Array1<f32> = actions.iter().enumerate().map(|(i, &a)| q_values[[i, a]]).collect();

        let loss = self.loss.compute_batch(predicted.view(), targets);
        if !loss.is_finite() {
            return Err(DqnError::NumericInstability(format!("loss is {}", loss)));
        }

        // only the taken action's output receives error signal
        let selected_grad = self.loss.gradient_batch(predicted.view(), targets);
        let mut output_errors = Array2::zeros(q_values.dim());
        for (i, &a) in actions.iter().enumerate() {
            output_errors[[i, a]] = selected_grad[i];
        }

        let mut gradients = self.online.backward(&caches, output_errors.view());
        self.clipper.clip(&mut gradients);
        self.optimizer.step(self.online.layers_mut(), &gradients, self.learning_rate);
        self.updates += 1;

        if !self.online.is_finite() {
            return Err(DqnError::NumericInstability(format!(
                "online parameters became non-finite after update {}", self.updates
            )));
        }
        Ok(loss)
    }

    fn sync_target(&mut self) -> Result<()> {
        copy_parameters(&self.online, &mut self.target)?;
        self.syncs += 1;
        debug!("target network synced (sync #{}, after {} updates)", self.syncs, self.updates);
        Ok(())
    }
}
