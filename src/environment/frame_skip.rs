use ndarray::Array1;

use crate::error::{DqnError, Result};
use super::{Environment, StepOutcome};

/// Action-repeat adapter.
///
/// Each `step` forwards the same action to the wrapped environment up to
/// `frame_skip` times, sums the rewards and returns the last observation.
/// A terminal frame ends the repeat early. Every observation and reward
/// coming out of the inner environment is validated; a malformed one is
/// reported as [`DqnError::Environment`], and so is any error the wrapped
/// environment returns.
pub struct FrameSkip<E> {
    inner: E,
    frame_skip: usize,
    frames: usize,
}

impl<E: Environment> FrameSkip<E> {
    pub fn new(inner: E, frame_skip: usize) -> Result<Self> {
        if frame_skip == 0 {
            return Err(DqnError::invalid_parameter("frame_skip", "must be at least 1"));
        }
        Ok(FrameSkip { inner, frame_skip, frames: 0 })
    }

    pub fn frame_skip(&self) -> usize {
        self.frame_skip
    }

    /// Raw simulator frames consumed since construction.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    fn check_observation(&self, observation: &Array1<f32>) -> Result<()> {
        let expected = self.inner.observation_dim();
        if observation.len() != expected {
            return Err(DqnError::Environment(format!(
                "observation has {} values, expected {}", observation.len(), expected
            )));
        }
        if let Some(bad) = observation.iter().find(|v| !v.is_finite()) {
            return Err(DqnError::Environment(format!("observation contains {}", bad)));
        }
        Ok(())
    }
}

fn adapter_error(err: DqnError) -> DqnError {
    match err {
        DqnError::Environment(_) => err,
        other => DqnError::Environment(other.to_string()),
    }
}

impl<E: Environment> Environment for FrameSkip<E> {
    fn observation_dim(&self) -> usize {
        self.inner.observation_dim()
    }

    fn num_actions(&self) -> usize {
        self.inner.num_actions()
    }

    fn reset(&mut self) -> Result<Array1<f32>> {
        let observation = self.inner.reset().map_err(adapter_error)?;
        self.check_observation(&observation)?;
        Ok(observation)
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome> {
        let num_actions = self.inner.num_actions();
        if action >= num_actions {
            return Err(DqnError::InvalidAction { action, num_actions });
        }

        let mut total_reward = 0.0;
        let mut last: Option<StepOutcome> = None;
        for _ in 0..self.frame_skip {
            let outcome = self.inner.step(action).map_err(adapter_error)?;
            self.frames += 1;
            if !outcome.reward.is_finite() {
                return Err(DqnError::Environment(format!("reward is {}", outcome.reward)));
            }
            self.check_observation(&outcome.observation)?;
            total_reward += outcome.reward;
            let done = outcome.done;
            last = Some(outcome);
            if done {
                break;
            }
        }

        // frame_skip >= 1 so at least one frame was stepped
        let mut outcome = last.ok_or_else(|| DqnError::Environment("no frame was stepped".to_string()))?;
        outcome.reward = total_reward;
        Ok(outcome)
    }
}
