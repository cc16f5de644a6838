use std::sync::{Arc, PoisonError, RwLock};

use rand::Rng;

use crate::error::Result;
use super::{ReplayBuffer, Transition};

/// Replay store shared between one inserting thread and any number of
/// sampling threads.
///
/// Inserts hold the write lock for the duration of one slot overwrite and
/// samples hold the read lock while copying their batch out, so a sampled
/// batch is always a consistent snapshot and never observes a slot mid-write.
#[derive(Clone, Debug)]
pub struct SharedReplayBuffer {
    inner: Arc<RwLock<ReplayBuffer>>,
}

impl SharedReplayBuffer {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self::from_buffer(ReplayBuffer::new(capacity)?))
    }

    pub fn from_buffer(buffer: ReplayBuffer) -> Self {
        SharedReplayBuffer {
            inner: Arc::new(RwLock::new(buffer)),
        }
    }

    pub fn insert(&self, transition: Transition) -> Option<Transition> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).insert(transition)
    }

    /// Sample an owned batch under the read lock.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Vec<Transition>> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let batch = guard.sample(batch_size, rng)?;
        Ok(batch.into_iter().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).capacity()
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Transition> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }
}
