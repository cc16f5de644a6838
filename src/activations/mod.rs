//! # Activation Functions
//!
//! Hidden-layer non-linearities for the Q-value network. The output layer of a
//! Q-network is always [`Activation::Linear`] since action values are unbounded.
//!
//! - **ReLU**: `max(0, x)`, the activation used by the original DQN
//! - **LeakyReLU**: ReLU with a small negative slope
//! - **Tanh**: hyperbolic tangent
//! - **Linear**: identity

pub mod functions;

pub use functions::Activation;
