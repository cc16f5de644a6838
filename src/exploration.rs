//! Epsilon-greedy action selection with a linear exploration schedule.

use ndarray::ArrayView1;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{DqnError, Result};
use crate::network::{NetworkId, ValueApproximator};

/// Linear decay of the exploration rate over agent steps.
///
/// `value(step)` goes from `start` at step 0 to `end` at `step >= decay_span`
/// and stays there. It is a pure function of the step count.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    pub start: f32,
    pub end: f32,
    pub decay_span: usize,
}

impl EpsilonSchedule {
    pub fn new(start: f32, end: f32, decay_span: usize) -> Result<Self> {
        if !(0.0..=1.0).contains(&start) || !(0.0..=1.0).contains(&end) {
            return Err(DqnError::invalid_parameter("epsilon", "start and end must lie in [0, 1]"));
        }
        if end > start {
            return Err(DqnError::invalid_parameter("epsilon_final", "must not exceed epsilon_start"));
        }
        Ok(EpsilonSchedule { start, end, decay_span })
    }

    pub fn value(&self, step: usize) -> f32 {
        if step >= self.decay_span {
            return self.end;
        }
        let fraction = step as f64 / self.decay_span as f64;
        let eps = self.start as f64 - (self.start - self.end) as f64 * fraction;
        (eps as f32).max(self.end)
    }
}

/// Index of the largest value, lowest index on ties.
///
/// Fails on an empty slice or any non-finite value.
pub fn greedy_action(values: ArrayView1<f32>) -> Result<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(DqnError::NumericInstability(format!("Q-value for action {} is {}", i, v)));
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| DqnError::NumericInstability("no Q-values to choose from".to_string()))
}

/// Epsilon-greedy policy over the online network.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpsilonGreedy {
    num_actions: usize,
}

impl EpsilonGreedy {
    pub fn new(num_actions: usize) -> Result<Self> {
        if num_actions == 0 {
            return Err(DqnError::invalid_parameter("num_actions", "must be greater than 0"));
        }
        Ok(EpsilonGreedy { num_actions })
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// With probability `epsilon` a uniformly random action, otherwise the
    /// online network's argmax for `state`.
    pub fn select<A, R>(&self, approximator: &A, state: ArrayView1<f32>, epsilon: f32, rng: &mut R) -> Result<usize>
    where
        A: ValueApproximator + ?Sized,
        R: Rng + ?Sized,
    {
        if rng.gen::<f32>() < epsilon {
            return Ok(rng.gen_range(0..self.num_actions));
        }
        let q_values = approximator.evaluate_one(NetworkId::Online, state)?;
        if q_values.len() != self.num_actions {
            return Err(DqnError::dimension_mismatch(
                format!("{} Q-values", self.num_actions),
                format!("{}", q_values.len()),
            ));
        }
        greedy_action(q_values.view())
    }
}
