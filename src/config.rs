//! Training configuration.
//!
//! Every knob the training loop reads lives in [`TrainerConfig`]; nothing is
//! taken from globals or the environment. Defaults follow the published
//! Atari DQN setup where one exists.

use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{DqnError, Result};
use crate::exploration::EpsilonSchedule;
use crate::optimizer::OptimizerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Replay store capacity N
    pub replay_capacity: usize,
    /// Transitions per learning update
    pub batch_size: usize,
    /// Discount factor
    pub gamma: f32,
    /// Exploration rate at step 0
    pub epsilon_start: f32,
    /// Exploration floor reached at `epsilon_decay_span`
    pub epsilon_final: f32,
    /// Agent steps over which epsilon decays linearly
    pub epsilon_decay_span: usize,
    /// Learning updates between target syncs (C)
    pub target_sync_interval: usize,
    /// Simulator frames per agent step
    pub frame_skip: usize,
    /// Minimum stored transitions before learning starts
    pub warmup_size: usize,
    /// Agent steps after which training stops
    pub total_steps_budget: usize,
    pub learning_rate: f32,
    /// Hidden layer widths of the Q-network
    pub hidden_layers: Vec<usize>,
    pub optimizer: OptimizerConfig,
    /// Global gradient-norm clip, disabled when `None`
    pub max_grad_norm: Option<f32>,
    /// Learn once every this many agent steps
    pub train_frequency: usize,
    /// Per-episode step limit; a cut episode's last transition bootstraps
    pub max_episode_steps: Option<usize>,
    /// Exploration rate used by evaluation runs
    pub evaluation_epsilon: f32,
    /// Agent steps between checkpoints, disabled when `None`
    pub checkpoint_interval: Option<usize>,
    /// Seeds sampling, exploration and weight init when set
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            replay_capacity: 1_000_000,
            batch_size: 32,
            gamma: 0.99,
            epsilon_start: 1.0,
            epsilon_final: 0.1,
            epsilon_decay_span: 1_000_000,
            target_sync_interval: 10_000,
            frame_skip: 4,
            warmup_size: 50_000,
            total_steps_budget: 10_000_000,
            learning_rate: 0.00025,
            hidden_layers: vec![512],
            optimizer: OptimizerConfig::default(),
            max_grad_norm: None,
            train_frequency: 1,
            max_episode_steps: None,
            evaluation_epsilon: 0.05,
            checkpoint_interval: None,
            seed: None,
        }
    }
}

fn positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(DqnError::invalid_parameter(name, "must be greater than 0"));
    }
    Ok(())
}

fn unit_interval(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DqnError::invalid_parameter(name.to_string(), format!("{} is outside [0, 1]", value)));
    }
    Ok(())
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        positive("replay_capacity", self.replay_capacity)?;
        positive("batch_size", self.batch_size)?;
        positive("target_sync_interval", self.target_sync_interval)?;
        positive("frame_skip", self.frame_skip)?;
        positive("train_frequency", self.train_frequency)?;
        if self.batch_size > self.replay_capacity {
            return Err(DqnError::invalid_parameter("batch_size", "must not exceed replay_capacity"));
        }
        if self.warmup_size > self.replay_capacity {
            return Err(DqnError::invalid_parameter("warmup_size", "must not exceed replay_capacity"));
        }
        unit_interval("gamma", self.gamma)?;
        unit_interval("evaluation_epsilon", self.evaluation_epsilon)?;
        self.epsilon_schedule()?;
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(DqnError::invalid_parameter("learning_rate", "must be positive and finite"));
        }
        if self.hidden_layers.iter().any(|&w| w == 0) {
            return Err(DqnError::invalid_parameter("hidden_layers", "widths must be greater than 0"));
        }
        if let Some(norm) = self.max_grad_norm {
            if !(norm > 0.0) {
                return Err(DqnError::invalid_parameter("max_grad_norm", "must be positive"));
            }
        }
        if self.max_episode_steps == Some(0) {
            return Err(DqnError::invalid_parameter("max_episode_steps", "must be greater than 0"));
        }
        if self.checkpoint_interval == Some(0) {
            return Err(DqnError::invalid_parameter("checkpoint_interval", "must be greater than 0"));
        }
        Ok(())
    }

    pub fn epsilon_schedule(&self) -> Result<EpsilonSchedule> {
        EpsilonSchedule::new(self.epsilon_start, self.epsilon_final, self.epsilon_decay_span)
    }

    /// Transitions required before the first learning update.
    pub fn learning_starts(&self) -> usize {
        self.warmup_size.max(self.batch_size)
    }

    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn with_replay_capacity(mut self, capacity: usize) -> Self {
        self.replay_capacity = capacity;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_epsilon(mut self, start: f32, end: f32, decay_span: usize) -> Self {
        self.epsilon_start = start;
        self.epsilon_final = end;
        self.epsilon_decay_span = decay_span;
        self
    }

    pub fn with_target_sync_interval(mut self, interval: usize) -> Self {
        self.target_sync_interval = interval;
        self
    }

    pub fn with_frame_skip(mut self, frame_skip: usize) -> Self {
        self.frame_skip = frame_skip;
        self
    }

    pub fn with_warmup_size(mut self, warmup: usize) -> Self {
        self.warmup_size = warmup;
        self
    }

    pub fn with_total_steps_budget(mut self, steps: usize) -> Self {
        self.total_steps_budget = steps;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_hidden_layers(mut self, widths: &[usize]) -> Self {
        self.hidden_layers = widths.to_vec();
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_max_episode_steps(mut self, steps: usize) -> Self {
        self.max_episode_steps = Some(steps);
        self
    }

    pub fn with_checkpoint_interval(mut self, steps: usize) -> Self {
        self.checkpoint_interval = Some(steps);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_learning_starts_covers_batch() {
        let config = TrainerConfig::default().with_warmup_size(4).with_batch_size(32);
        assert_eq!(config.learning_starts(), 32);
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = || TrainerConfig::default().with_replay_capacity(100).with_warmup_size(10);
        assert!(base().validate().is_ok());
        assert!(base().with_replay_capacity(0).validate().is_err());
        assert!(base().with_batch_size(101).validate().is_err());
        assert!(base().with_gamma(1.5).validate().is_err());
        assert!(base().with_epsilon(0.1, 0.5, 100).validate().is_err());
        assert!(base().with_target_sync_interval(0).validate().is_err());
        assert!(base().with_frame_skip(0).validate().is_err());
        assert!(base().with_learning_rate(-1.0).validate().is_err());
        assert!(base().with_hidden_layers(&[64, 0]).validate().is_err());
        assert!(base().with_warmup_size(1000).validate().is_err());
    }

    #[test]
    fn test_json_round_trip_and_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = TrainerConfig::default()
            .with_replay_capacity(5000)
            .with_warmup_size(100)
            .with_seed(42);
        config.to_json_file(&path).unwrap();
        assert_eq!(TrainerConfig::from_json_file(&path).unwrap(), config);

        let partial = dir.path().join("partial.json");
        std::fs::write(&partial, r#"{ "batch_size": 64, "optimizer": { "kind": "adam", "beta1": 0.9, "beta2": 0.999, "epsilon": 1e-8 } }"#).unwrap();
        let loaded = TrainerConfig::from_json_file(&partial).unwrap();
        assert_eq!(loaded.batch_size, 64);
        assert_eq!(loaded.gamma, 0.99);
        assert!(matches!(loaded.optimizer, OptimizerConfig::Adam { .. }));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "frame_skip": 0 }"#).unwrap();
        assert!(TrainerConfig::from_json_file(&path).is_err());
    }
}
