//! # Environment Boundary
//!
//! The simulator is an external collaborator. The training core only needs
//! `reset` and `step` over a fixed-width, already preprocessed observation
//! (for Atari-style inputs: stacked, downscaled luminance frames flattened
//! into one vector) and a finite discrete action set.

mod frame_skip;

use ndarray::Array1;

use crate::error::Result;

pub use frame_skip::FrameSkip;

/// Free-form diagnostic data attached to a step (lives, frame number, ...).
pub type StepInfo = serde_json::Map<String, serde_json::Value>;

/// Result of a single environment step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Array1<f32>,
    /// Raw, unclipped reward
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

impl StepOutcome {
    pub fn new(observation: Array1<f32>, reward: f32, done: bool) -> Self {
        StepOutcome {
            observation,
            reward,
            done,
            info: StepInfo::new(),
        }
    }
}

/// A step-emitting simulator with a discrete action set `[0, num_actions)`.
pub trait Environment {
    /// Width of every observation this environment emits.
    fn observation_dim(&self) -> usize;

    fn num_actions(&self) -> usize;

    /// Start a new episode and return its first observation.
    fn reset(&mut self) -> Result<Array1<f32>>;

    fn step(&mut self, action: usize) -> Result<StepOutcome>;
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn observation_dim(&self) -> usize {
        (**self).observation_dim()
    }

    fn num_actions(&self) -> usize {
        (**self).num_actions()
    }

    fn reset(&mut self) -> Result<Array1<f32>> {
        (**self).reset()
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome> {
        (**self).step(action)
    }
}
