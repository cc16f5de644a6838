pub mod dense;
pub mod initialization;

pub use dense::{DenseLayer, LayerCache, LayerGradients};
pub use initialization::WeightInit;
