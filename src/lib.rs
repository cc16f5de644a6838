//! # deepq - Deep Q-Network Training Core
//!
//! `deepq` implements the learning core of a DQN agent: a capacity-bounded
//! experience replay ring, an online/target Q-network pair trained with the
//! Huber TD loss, epsilon-greedy exploration on a linear schedule, and a
//! single-threaded training loop with reward clipping, frame skipping and
//! periodic target synchronisation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deepq::config::TrainerConfig;
//! use deepq::environment::{Environment, StepOutcome};
//! use deepq::metrics::LogSink;
//! use deepq::trainer::Trainer;
//! use ndarray::{array, Array1};
//!
//! struct Coin { flips: usize }
//!
//! impl Environment for Coin {
//!     fn observation_dim(&self) -> usize { 1 }
//!     fn num_actions(&self) -> usize { 2 }
//!     fn reset(&mut self) -> deepq::Result<Array1<f32>> {
//!         self.flips = 0;
//!         Ok(array![0.0])
//!     }
//!     fn step(&mut self, action: usize) -> deepq::Result<StepOutcome> {
//!         self.flips += 1;
//!         Ok(StepOutcome::new(array![self.flips as f32], action as f32, self.flips >= 10))
//!     }
//! }
//!
//! let config = TrainerConfig::default()
//!     .with_replay_capacity(10_000)
//!     .with_warmup_size(500)
//!     .with_total_steps_budget(20_000)
//!     .with_hidden_layers(&[32]);
//! let mut trainer = Trainer::from_config(config, Coin { flips: 0 }, LogSink)?;
//! let summary = trainer.run()?;
//! println!("{} episodes", summary.episodes_completed);
//! # Ok::<(), deepq::DqnError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - Activation functions for hidden and output layers
//! - [`builders`] - Builder for the online/target network pair
//! - [`checkpoint`] - Checkpoint sink trait and file checkpointer
//! - [`config`] - Training configuration
//! - [`environment`] - Environment trait and frame-skip adapter
//! - [`error`] - Error types and result handling
//! - [`exploration`] - Epsilon schedule and epsilon-greedy selection
//! - [`layers`] - Dense layers and weight initialization
//! - [`loss`] - Huber loss for the TD update
//! - [`metrics`] - Per-episode metrics sinks
//! - [`network`] - Q-network parameters and the online/target pair
//! - [`optimizer`] - SGD, Adam, RMSProp and gradient clipping
//! - [`replay_buffer`] - Experience replay ring buffer
//! - [`trainer`] - The training loop

pub mod activations;
pub mod builders;
pub mod checkpoint;
pub mod config;
pub mod environment;
pub mod error;
pub mod exploration;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod replay_buffer;
pub mod trainer;

pub use error::{DqnError, Result};

#[cfg(test)]
mod tests;
