//! Per-sample regression losses for the temporal-difference update.
//!
//! A Q-learning update only regresses the value of the action that was
//! actually taken, so losses here work on flat vectors: one prediction and one
//! target per sampled transition.

pub mod functions;

pub use functions::{HuberLoss, Loss};
