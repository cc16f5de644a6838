//! # Training Metrics
//!
//! The training loop reports one [`TrainingRecord`] per finished episode to a
//! [`MetricsSink`]. Sinks are fire-and-forget: the loop never reads anything
//! back, and a sink that fails to persist a record logs the failure instead of
//! interrupting training.

pub mod csv;
pub mod tracker;

use log::info;
use serde::{Serialize, Deserialize};

pub use csv::CsvMetricsWriter;
pub use tracker::{MetricsTracker, TrainingMetrics};

/// Per-episode summary emitted by the training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub episode_index: usize,
    /// Sum of raw (unclipped) rewards
    pub total_reward: f32,
    /// Sum of clipped rewards, the signal the learner actually saw
    pub clipped_reward: f32,
    /// Mean loss over the episode's learning updates, `None` before warm-up
    pub loss: Option<f32>,
    /// Exploration rate at the episode's last step
    pub epsilon: f32,
    /// Global agent step at episode end
    pub global_step: usize,
    pub episode_steps: usize,
    /// Ended by the step budget or a time limit rather than a terminal state
    pub truncated: bool,
}

/// Consumer of training records.
pub trait MetricsSink {
    fn record(&mut self, record: &TrainingRecord);
}

impl<M: MetricsSink + ?Sized> MetricsSink for Box<M> {
    fn record(&mut self, record: &TrainingRecord) {
        (**self).record(record)
    }
}

impl<M: MetricsSink + ?Sized> MetricsSink for &mut M {
    fn record(&mut self, record: &TrainingRecord) {
        (**self).record(record)
    }
}

/// Collects records in memory.
impl MetricsSink for Vec<TrainingRecord> {
    fn record(&mut self, record: &TrainingRecord) {
        self.push(record.clone());
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&mut self, _record: &TrainingRecord) {}
}

/// Writes one `info!` line per episode through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn record(&mut self, record: &TrainingRecord) {
        let loss = match record.loss {
            Some(loss) => format!("{:.5}", loss),
            None => "-".to_string(),
        };
        info!(
            "episode {} | return {:.1} (clipped {:.1}) | steps {} | loss {} | epsilon {:.3} | global step {}{}",
            record.episode_index,
            record.total_reward,
            record.clipped_reward,
            record.episode_steps,
            loss,
            record.epsilon,
            record.global_step,
            if record.truncated { " | truncated" } else { "" },
        );
    }
}

/// Fans a record out to two sinks.
impl<A: MetricsSink, B: MetricsSink> MetricsSink for (A, B) {
    fn record(&mut self, record: &TrainingRecord) {
        self.0.record(record);
        self.1.record(record);
    }
}
