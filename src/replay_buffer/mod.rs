//! # Experience Replay
//!
//! A fixed-capacity ring of [`Transition`]s. Insertion past capacity
//! overwrites the oldest entry (FIFO eviction). Sampling draws a batch
//! uniformly at random without replacement within the call; separate calls
//! are independent, so a transition can show up in many batches.
//!
//! [`SharedReplayBuffer`] wraps the same ring for a producer thread that
//! inserts while learner threads sample.

mod shared;

use ndarray::Array1;
use rand::seq::index;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{DqnError, Result};

pub use shared::SharedReplayBuffer;

/// One environment step as seen by the learner.
///
/// `reward` is stored as given; the training loop clips it to `[-1, 1]`
/// before building the transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Array1<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub done: bool,
}

impl Transition {
    pub fn new(state: Array1<f32>, action: usize, reward: f32, next_state: Array1<f32>, done: bool) -> Self {
        Transition { state, action, reward, next_state, done }
    }
}

/// Ring buffer of transitions with a write cursor.
///
/// Storage is reserved once at construction and never grows past
/// `capacity`; once full, every insert overwrites the slot under the cursor.
#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    slots: Vec<Transition>,
    capacity: usize,
    cursor: usize,
    total_inserted: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(DqnError::invalid_parameter("capacity", "must be greater than 0"));
        }
        Ok(ReplayBuffer {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            total_inserted: 0,
        })
    }

    /// Insert a transition, returning the evicted one when the ring was full.
    pub fn insert(&mut self, transition: Transition) -> Option<Transition> {
        let evicted = if self.slots.len() < self.capacity {
            self.slots.push(transition);
            None
        } else {
            Some(std::mem::replace(&mut self.slots[self.cursor], transition))
        };
        self.cursor = (self.cursor + 1) % self.capacity;
        self.total_inserted += 1;
        evicted
    }

    /// Draw `batch_size` distinct transitions uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Vec<&Transition>> {
        if batch_size > self.slots.len() {
            return Err(DqnError::InsufficientData {
                requested: batch_size,
                available: self.slots.len(),
            });
        }
        Ok(index::sample(rng, self.slots.len(), batch_size)
            .into_iter()
            .map(|i| &self.slots[i])
            .collect())
    }

    /// True once the store holds at least `batch_size` transitions.
    pub fn can_sample(&self, batch_size: usize) -> bool {
        self.slots.len() >= batch_size
    }

    /// Transition by age, `0` being the oldest still stored.
    pub fn get(&self, age_index: usize) -> Option<&Transition> {
        if age_index >= self.slots.len() {
            return None;
        }
        let oldest = if self.is_full() { self.cursor } else { 0 };
        self.slots.get((oldest + age_index) % self.slots.len())
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> + '_ {
        // before the first wrap cursor == len, so the first half is empty
        self.slots[self.cursor.min(self.slots.len())..]
            .iter()
            .chain(self.slots[..self.cursor.min(self.slots.len())].iter())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of inserts since construction, including evicted ones.
    pub fn total_inserted(&self) -> usize {
        self.total_inserted
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.cursor = 0;
    }
}
