//! Train a DQN agent on a small CartPole simulation.
//!
//! ```bash
//! RUST_LOG=info cargo run --release --example cartpole [config.json]
//! ```
//!
//! An optional JSON file overrides any `TrainerConfig` field.

use std::env;

use deepq::checkpoint::FileCheckpointer;
use deepq::config::TrainerConfig;
use deepq::environment::{Environment, StepOutcome};
use deepq::metrics::{CsvMetricsWriter, LogSink, MetricsSink, MetricsTracker, TrainingRecord};
use deepq::trainer::Trainer;
use deepq::Result;
use log::info;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Cart-pole balancing with the classic dynamics.
struct CartPole {
    x: f32,
    x_dot: f32,
    theta: f32,
    theta_dot: f32,
    steps: usize,
    rng: StdRng,
}

impl CartPole {
    fn new(seed: u64) -> Self {
        CartPole {
            x: 0.0,
            x_dot: 0.0,
            theta: 0.0,
            theta_dot: 0.0,
            steps: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn state(&self) -> Array1<f32> {
        Array1::from_vec(vec![self.x, self.x_dot, self.theta, self.theta_dot])
    }
}

impl Environment for CartPole {
    fn observation_dim(&self) -> usize {
        4
    }

    fn num_actions(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<Array1<f32>> {
        self.x = self.rng.gen_range(-0.05..0.05);
        self.x_dot = self.rng.gen_range(-0.05..0.05);
        self.theta = self.rng.gen_range(-0.05..0.05);
        self.theta_dot = self.rng.gen_range(-0.05..0.05);
        self.steps = 0;
        Ok(self.state())
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome> {
        let force = if action == 1 { 10.0 } else { -10.0 };
        let gravity = 9.8;
        let mass_pole = 0.1;
        let total_mass = 1.0 + mass_pole;
        let length = 0.5;
        let pole_mass_length = mass_pole * length;
        let dt = 0.02;

        let (sin_theta, cos_theta) = self.theta.sin_cos();
        let temp = (force + pole_mass_length * self.theta_dot.powi(2) * sin_theta) / total_mass;
        let theta_acc = (gravity * sin_theta - cos_theta * temp)
            / (length * (4.0 / 3.0 - mass_pole * cos_theta.powi(2) / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        self.x += self.x_dot * dt;
        self.x_dot += x_acc * dt;
        self.theta += self.theta_dot * dt;
        self.theta_dot += theta_acc * dt;
        self.steps += 1;

        let fell = self.x.abs() > 2.4 || self.theta.abs() > 0.209;
        let reward = if fell { 0.0 } else { 1.0 };
        Ok(StepOutcome::new(self.state(), reward, fell))
    }
}

/// Fans records out to the log, an in-memory tracker and a CSV file.
struct DemoSink {
    log: LogSink,
    tracker: MetricsTracker,
    csv: Option<CsvMetricsWriter>,
}

impl MetricsSink for DemoSink {
    fn record(&mut self, record: &TrainingRecord) {
        self.log.record(record);
        self.tracker.record(record);
        if let Some(csv) = self.csv.as_mut() {
            csv.record(record);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => TrainerConfig::from_json_file(path)?,
        None => TrainerConfig::default()
            .with_replay_capacity(50_000)
            .with_batch_size(64)
            .with_warmup_size(1_000)
            .with_epsilon(1.0, 0.05, 20_000)
            .with_target_sync_interval(500)
            .with_frame_skip(1)
            .with_total_steps_budget(50_000)
            .with_learning_rate(0.001)
            .with_hidden_layers(&[64, 64])
            .with_max_episode_steps(500)
            .with_checkpoint_interval(10_000)
            .with_seed(7),
    };

    let out_dir = env::temp_dir().join("deepq-cartpole");
    let sink = DemoSink {
        log: LogSink,
        tracker: MetricsTracker::new(100),
        csv: CsvMetricsWriter::new(&out_dir, "run").ok(),
    };
    let checkpointer = FileCheckpointer::new(out_dir.join("checkpoints"))?.keep_last(3)?;

    let seed = config.seed.unwrap_or(0);
    let mut trainer = Trainer::from_config(config, CartPole::new(seed), sink)?
        .with_checkpointer(checkpointer);
    let summary = trainer.run()?;

    let tracker = &trainer.metrics().tracker;
    info!(
        "{} steps, {} updates, {} target syncs, {} episodes",
        summary.global_steps, summary.learn_steps, summary.target_syncs, summary.episodes_completed
    );
    if let Some(avg) = tracker.avg_episode_reward(20) {
        info!("average return over the last 20 episodes: {:.1}", avg);
    }

    let returns = trainer.evaluate(10)?;
    let mean = returns.iter().sum::<f32>() / returns.len() as f32;
    info!("evaluation return over {} episodes: {:.1}", returns.len(), mean);
    Ok(())
}
