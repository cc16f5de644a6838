use serde::{Serialize, Deserialize};

use crate::layers::LayerGradients;

/// Gradient clipping methods applied to a full set of layer gradients
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum GradientClipper {
    /// Clip every gradient component into `[min, max]`
    ClipByValue { min: f32, max: f32 },

    /// Rescale each layer's gradients so its own norm is at most `max_norm`
    ClipByNorm { max_norm: f32 },

    /// Rescale all gradients together so the global norm is at most `max_norm`
    ClipByGlobalNorm { max_norm: f32 },

    /// No clipping
    #[default]
    None,
}

impl GradientClipper {
    /// Clip in place and return the global norm measured before clipping.
    pub fn clip(&self, gradients: &mut [LayerGradients]) -> f32 {
        let global_norm = Self::compute_global_norm(gradients);

        match self {
            GradientClipper::ClipByValue { min, max } => {
                for grad in gradients.iter_mut() {
                    grad.weights.mapv_inplace(|g| g.max(*min).min(*max));
                    grad.biases.mapv_inplace(|g| g.max(*min).min(*max));
                }
            }

            GradientClipper::ClipByNorm { max_norm } => {
                for grad in gradients.iter_mut() {
                    let norm = Self::compute_global_norm(std::slice::from_ref(grad));
                    if norm > *max_norm {
                        let scale = max_norm / norm;
                        grad.weights.mapv_inplace(|g| g * scale);
                        grad.biases.mapv_inplace(|g| g * scale);
                    }
                }
            }

            GradientClipper::ClipByGlobalNorm { max_norm } => {
                if global_norm > *max_norm {
                    let scale = max_norm / global_norm;
                    for grad in gradients.iter_mut() {
                        grad.weights.mapv_inplace(|g| g * scale);
                        grad.biases.mapv_inplace(|g| g * scale);
                    }
                }
            }

            GradientClipper::None => {}
        }

        global_norm
    }

    /// Compute global L2 norm of all gradients
    pub fn compute_global_norm(gradients: &[LayerGradients]) -> f32 {
        gradients.iter()
            .map(|g| {
                g.weights.iter().map(|&x| x * x).sum::<f32>()
                    + g.biases.iter().map(|&x| x * x).sum::<f32>()
            })
            .sum::<f32>()
            .sqrt()
    }
}
