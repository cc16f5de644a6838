use std::collections::VecDeque;
use std::path::Path;

use serde::{Serialize, Deserialize};

use super::{MetricsSink, TrainingRecord};

/// Bounded history of per-episode training metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Mean loss per episode (episodes without updates are skipped)
    pub losses: VecDeque<f32>,

    /// Raw return per episode
    pub episode_rewards: VecDeque<f32>,

    /// Clipped return per episode
    pub clipped_rewards: VecDeque<f32>,

    /// Agent steps per episode
    pub episode_lengths: VecDeque<usize>,

    /// Epsilon at the end of each episode
    pub epsilons: VecDeque<f32>,
}

impl TrainingMetrics {
    pub fn new(history_size: usize) -> Self {
        TrainingMetrics {
            losses: VecDeque::with_capacity(history_size),
            episode_rewards: VecDeque::with_capacity(history_size),
            clipped_rewards: VecDeque::with_capacity(history_size),
            episode_lengths: VecDeque::with_capacity(history_size),
            epsilons: VecDeque::with_capacity(history_size),
        }
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, limit: usize) {
    if queue.len() >= limit {
        queue.pop_front();
    }
    queue.push_back(value);
}

/// Tracks metrics during training
pub struct MetricsTracker {
    metrics: TrainingMetrics,
    history_size: usize,
    episode_count: usize,
    total_steps: usize,
    best_reward: Option<f32>,
}

impl MetricsTracker {
    pub fn new(history_size: usize) -> Self {
        let history_size = history_size.max(1);
        MetricsTracker {
            metrics: TrainingMetrics::new(history_size),
            history_size,
            episode_count: 0,
            total_steps: 0,
            best_reward: None,
        }
    }

    /// Get a reference to the metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Get episode count
    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    /// Global step of the most recent record
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Highest raw episode return seen, including episodes already rotated out
    pub fn best_reward(&self) -> Option<f32> {
        self.best_reward
    }

    /// Get recent average loss
    pub fn avg_loss(&self, window: usize) -> Option<f32> {
        Self::tail_mean(&self.metrics.losses, window)
    }

    /// Get recent average episode reward
    pub fn avg_episode_reward(&self, window: usize) -> Option<f32> {
        Self::tail_mean(&self.metrics.episode_rewards, window)
    }

    /// Clear all metrics
    pub fn clear(&mut self) {
        self.metrics = TrainingMetrics::new(self.history_size);
        self.episode_count = 0;
        self.total_steps = 0;
        self.best_reward = None;
    }

    /// Save metrics to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::error::Result<()> {
        let serialized = serde_json::to_string_pretty(&self.metrics)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Load metrics from file
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> crate::error::Result<()> {
        let data = std::fs::read_to_string(path)?;
        self.metrics = serde_json::from_str(&data)?;
        Ok(())
    }

    fn tail_mean(values: &VecDeque<f32>, window: usize) -> Option<f32> {
        if values.is_empty() || window == 0 {
            return None;
        }
        let n = window.min(values.len());
        let sum: f32 = values.iter().rev().take(n).sum();
        Some(sum / n as f32)
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl MetricsSink for MetricsTracker {
    fn record(&mut self, record: &TrainingRecord) {
        let limit = self.history_size;
        if let Some(loss) = record.loss {
            push_bounded(&mut self.metrics.losses, loss, limit);
        }
        push_bounded(&mut self.metrics.episode_rewards, record.total_reward, limit);
        push_bounded(&mut self.metrics.clipped_rewards, record.clipped_reward, limit);
        push_bounded(&mut self.metrics.episode_lengths, record.episode_steps, limit);
        push_bounded(&mut self.metrics.epsilons, record.epsilon, limit);

        self.best_reward = Some(match self.best_reward {
            Some(best) => best.max(record.total_reward),
            None => record.total_reward,
        });
        self.episode_count += 1;
        self.total_steps = record.global_step;
    }
}
