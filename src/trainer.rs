//! # Training Loop
//!
//! [`Trainer`] owns every moving part of a DQN run and advances it one agent
//! step at a time:
//!
//! 1. pick an action epsilon-greedily, epsilon derived from the global step
//! 2. run it through the frame-skip adapter
//! 3. clip the aggregated reward to `[-1, 1]` and store the transition
//! 4. once the buffer holds `max(warmup_size, batch_size)` transitions, learn
//!    from a uniformly sampled batch with targets from the target network
//! 5. every `target_sync_interval` learning updates, sync the target network
//!
//! Each episode moves through [`EpisodePhase`]: `AwaitingReset` resets the
//! environment, `Stepping` runs until the episode ends, and `Terminal`
//! records the episode before the next reset starts a new episode index.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};

use crate::builders::ValueNetworkPairBuilder;
use crate::checkpoint::{CheckpointSink, TrainingProgress};
use crate::config::TrainerConfig;
use crate::environment::{Environment, FrameSkip};
use crate::error::{DqnError, Result};
use crate::exploration::{EpsilonGreedy, EpsilonSchedule};
use crate::metrics::{MetricsSink, TrainingRecord};
use crate::network::{NetworkId, ValueApproximator, ValueNetworkPair};
use crate::replay_buffer::{ReplayBuffer, Transition};

/// Clip a reward into `[-1, 1]`.
pub fn clip_reward(reward: f32) -> f32 {
    reward.clamp(-1.0, 1.0)
}

/// One-step TD targets.
///
/// `target[i] = rewards[i]` when `dones[i]`, otherwise
/// `rewards[i] + gamma * max_a next_q_target[i, a]`. The next-state values must
/// come from the target network.
pub fn compute_targets(
    rewards: ArrayView1<f32>,
    next_q_target: ArrayView2<f32>,
    dones: &[bool],
    gamma: f32,
) -> Result<Array1<f32>> {
    let n = rewards.len();
    if next_q_target.nrows() != n || dones.len() != n {
        return Err(DqnError::dimension_mismatch(
            format!("{} rows", n),
            format!("{} next-state rows, {} done flags", next_q_target.nrows(), dones.len()),
        ));
    }
    if next_q_target.ncols() == 0 {
        return Err(DqnError::invalid_parameter("next_q_target", "must have at least one action column"));
    }

    let mut targets = Array1::zeros(n);
    for i in 0..n {
        targets[i] = if dones[i] {
            rewards[i]
        } else {
            let max_next = next_q_target.row(i).fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            rewards[i] + gamma * max_next
        };
    }
    Ok(targets)
}

/// Where the current episode stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    AwaitingReset,
    Stepping,
    Terminal,
}

/// What a single [`Trainer::step`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Global step after this step
    pub global_step: usize,
    pub action: usize,
    /// Frame-skip aggregated raw reward
    pub reward: f32,
    pub clipped_reward: f32,
    pub epsilon: f32,
    /// Loss of the learning update run on this step, if any
    pub loss: Option<f32>,
    /// Whether the target network was synced on this step
    pub synced: bool,
    /// Set when this step finished an episode
    pub episode: Option<TrainingRecord>,
}

/// Totals at the end of [`Trainer::run`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub global_steps: usize,
    pub learn_steps: usize,
    pub target_syncs: usize,
    pub episodes_completed: usize,
    /// Raw simulator frames spent on training, `global_steps * frame_skip`
    /// minus early terminations. Evaluation frames are not counted.
    pub frames: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct EpisodeStats {
    raw_return: f32,
    clipped_return: f32,
    steps: usize,
    loss_sum: f32,
    updates: usize,
}

impl EpisodeStats {
    fn mean_loss(&self) -> Option<f32> {
        if self.updates == 0 {
            None
        } else {
            Some(self.loss_sum / self.updates as f32)
        }
    }
}

struct LearnOutcome {
    loss: f32,
    synced: bool,
}

/// Single-threaded DQN training orchestrator.
pub struct Trainer<E, A = ValueNetworkPair, M = crate::metrics::NullSink> {
    config: TrainerConfig,
    env: FrameSkip<E>,
    approximator: A,
    replay: ReplayBuffer,
    selector: EpsilonGreedy,
    schedule: EpsilonSchedule,
    metrics: M,
    checkpointer: Option<Box<dyn CheckpointSink<A>>>,
    rng: StdRng,
    phase: EpisodePhase,
    current_state: Option<Array1<f32>>,
    episode: EpisodeStats,
    global_step: usize,
    learn_steps: usize,
    target_syncs: usize,
    episode_index: usize,
    episodes_completed: usize,
    frames: usize,
    warmed_up: bool,
}

impl<E: Environment, M: MetricsSink> Trainer<E, ValueNetworkPair, M> {
    /// Build the MLP network pair from `config` and the environment's shapes.
    pub fn from_config(config: TrainerConfig, env: E, metrics: M) -> Result<Self> {
        let approximator = ValueNetworkPairBuilder::from_config(&config)
            .input_dim(env.observation_dim())
            .num_actions(env.num_actions())
            .build()?;
        Self::new(config, env, approximator, metrics)
    }
}

impl<E, A, M> Trainer<E, A, M>
where
    E: Environment,
    A: ValueApproximator,
    M: MetricsSink,
{
    pub fn new(config: TrainerConfig, env: E, approximator: A, metrics: M) -> Result<Self> {
        config.validate()?;
        if env.observation_dim() != approximator.state_dim() {
            return Err(DqnError::dimension_mismatch(
                format!("observation width {}", approximator.state_dim()),
                format!("{}", env.observation_dim()),
            ));
        }
        if env.num_actions() != approximator.num_actions() {
            return Err(DqnError::dimension_mismatch(
                format!("{} actions", approximator.num_actions()),
                format!("{}", env.num_actions()),
            ));
        }

        let env = FrameSkip::new(env, config.frame_skip)?;
        let replay = ReplayBuffer::new(config.replay_capacity)?;
        let selector = EpsilonGreedy::new(approximator.num_actions())?;
        let schedule = config.epsilon_schedule()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Trainer {
            config,
            env,
            approximator,
            replay,
            selector,
            schedule,
            metrics,
            checkpointer: None,
            rng,
            phase: EpisodePhase::AwaitingReset,
            current_state: None,
            episode: EpisodeStats::default(),
            global_step: 0,
            learn_steps: 0,
            target_syncs: 0,
            episode_index: 0,
            episodes_completed: 0,
            frames: 0,
            warmed_up: false,
        })
    }

    /// Save through `sink` every `checkpoint_interval` agent steps.
    pub fn with_checkpointer<C: CheckpointSink<A> + 'static>(mut self, sink: C) -> Self {
        self.checkpointer = Some(Box::new(sink));
        self
    }

    /// Continue the counters of a checkpointed run.
    ///
    /// The global step comes back with everything derived from it: epsilon,
    /// the remaining budget and the checkpoint cadence. Learning updates, target
    /// syncs, episodes and frames continue from the snapshot too. The replay
    /// buffer is not checkpointed, so learning waits for warm-up again.
    pub fn with_progress(mut self, progress: TrainingProgress) -> Self {
        self.abandon_episode();
        self.global_step = progress.global_step;
        self.learn_steps = progress.learn_steps;
        self.target_syncs = progress.learn_steps / self.config.target_sync_interval;
        self.episodes_completed = progress.episodes_completed;
        self.episode_index = progress.episodes_completed;
        self.frames = progress.frames;
        self.warmed_up = false;

        let epsilon = self.epsilon();
        if (epsilon - progress.epsilon).abs() > 1e-6 {
            warn!(
                "epsilon schedule gives {} at step {}, checkpoint recorded {}",
                epsilon, progress.global_step, progress.epsilon
            );
        }
        debug!(
            "resuming at step {} after {} updates and {} episodes",
            self.global_step, self.learn_steps, self.episodes_completed
        );
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn approximator(&self) -> &A {
        &self.approximator
    }

    pub fn replay(&self) -> &ReplayBuffer {
        &self.replay
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut M {
        &mut self.metrics
    }

    pub fn env(&self) -> &FrameSkip<E> {
        &self.env
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    /// Learning updates applied to the online network.
    pub fn learn_steps(&self) -> usize {
        self.learn_steps
    }

    pub fn target_syncs(&self) -> usize {
        self.target_syncs
    }

    /// Index of the episode in progress, or of the next one to start.
    pub fn episode_index(&self) -> usize {
        self.episode_index
    }

    pub fn episodes_completed(&self) -> usize {
        self.episodes_completed
    }

    /// Exploration rate the next step will use.
    pub fn epsilon(&self) -> f32 {
        self.schedule.value(self.global_step)
    }

    pub fn is_finished(&self) -> bool {
        self.global_step >= self.config.total_steps_budget
    }

    pub fn progress(&self) -> TrainingProgress {
        TrainingProgress {
            global_step: self.global_step,
            learn_steps: self.learn_steps,
            episodes_completed: self.episodes_completed,
            frames: self.frames,
            epsilon: self.epsilon(),
        }
    }

    pub fn summary(&self) -> TrainingSummary {
        TrainingSummary {
            global_steps: self.global_step,
            learn_steps: self.learn_steps,
            target_syncs: self.target_syncs,
            episodes_completed: self.episodes_completed,
            frames: self.frames,
        }
    }

    pub fn into_approximator(self) -> A {
        self.approximator
    }

    /// Advance by one agent step, resetting the environment first if no
    /// episode is in progress.
    ///
    /// A failing checkpoint sink is reported after the step's bookkeeping is
    /// done, so the episode either continues or has already been recorded.
    pub fn step(&mut self) -> Result<StepReport> {
        if self.is_finished() {
            return Err(DqnError::invalid_parameter(
                "total_steps_budget",
                "step budget is exhausted",
            ));
        }

        let state = match (self.phase, self.current_state.take()) {
            (EpisodePhase::Stepping, Some(state)) => state,
            _ => self.begin_episode()?,
        };

        let epsilon = self.schedule.value(self.global_step);
        let action = match self.selector.select(&self.approximator, state.view(), epsilon, &mut self.rng) {
            Ok(action) => action,
            Err(err) => {
                warn!("action selection failed at step {}: {}", self.global_step, err);
                self.abandon_episode();
                return Err(err);
            }
        };

        let frames_before = self.env.frames();
        let stepped = self.env.step(action);
        self.frames += self.env.frames() - frames_before;
        let outcome = match stepped {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("episode {} aborted by environment error: {}", self.episode_index, err);
                self.abandon_episode();
                return Err(err);
            }
        };

        let clipped = clip_reward(outcome.reward);
        self.episode.raw_return += outcome.reward;
        self.episode.clipped_return += clipped;
        self.episode.steps += 1;

        let time_limit = self.config.max_episode_steps
            .map_or(false, |limit| self.episode.steps >= limit);

        self.replay.insert(Transition::new(
            state,
            action,
            clipped,
            outcome.observation.clone(),
            outcome.done,
        ));
        self.global_step += 1;
        trace!(
            "step {}: action {} reward {} done {}",
            self.global_step, action, outcome.reward, outcome.done
        );

        let mut loss = None;
        let mut synced = false;
        if self.global_step % self.config.train_frequency == 0 {
            match self.learn() {
                Ok(Some(learned)) => {
                    self.episode.loss_sum += learned.loss;
                    self.episode.updates += 1;
                    loss = Some(learned.loss);
                    synced = learned.synced;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("learning update failed at step {}: {}", self.global_step, err);
                    self.abandon_episode();
                    return Err(err);
                }
            }
        }

        let truncated = !outcome.done && (time_limit || self.is_finished());
        let episode = if outcome.done || truncated {
            Some(self.finish_episode(epsilon, truncated))
        } else {
            self.current_state = Some(outcome.observation);
            None
        };

        if let Err(err) = self.maybe_checkpoint() {
            warn!("checkpoint at step {} failed: {}", self.global_step, err);
            return Err(err);
        }

        Ok(StepReport {
            global_step: self.global_step,
            action,
            reward: outcome.reward,
            clipped_reward: clipped,
            epsilon,
            loss,
            synced,
            episode,
        })
    }

    /// Step until the current (or next) episode ends.
    pub fn run_episode(&mut self) -> Result<TrainingRecord> {
        loop {
            if let Some(record) = self.step()?.episode {
                return Ok(record);
            }
        }
    }

    /// Step until the global step budget is spent.
    pub fn run(&mut self) -> Result<TrainingSummary> {
        while !self.is_finished() {
            self.step()?;
        }
        let summary = self.summary();
        debug!(
            "training finished: {} steps, {} updates, {} syncs, {} episodes",
            summary.global_steps, summary.learn_steps, summary.target_syncs, summary.episodes_completed
        );
        Ok(summary)
    }

    /// Run `episodes` episodes at `evaluation_epsilon` and return their raw
    /// returns. Nothing is stored or learned. A training episode in progress
    /// is abandoned and not recorded.
    pub fn evaluate(&mut self, episodes: usize) -> Result<Vec<f32>> {
        if self.phase == EpisodePhase::Stepping {
            debug!("abandoning episode {} for evaluation", self.episode_index);
        }
        self.abandon_episode();

        let epsilon = self.config.evaluation_epsilon;
        let mut returns = Vec::with_capacity(episodes);
        for _ in 0..episodes {
            let mut state = self.env.reset()?;
            let mut total = 0.0;
            let mut steps = 0;
            loop {
                let action = self.selector.select(&self.approximator, state.view(), epsilon, &mut self.rng)?;
                let outcome = self.env.step(action)?;
                total += outcome.reward;
                steps += 1;
                let time_limit = self.config.max_episode_steps.map_or(false, |limit| steps >= limit);
                if outcome.done || time_limit {
                    break;
                }
                state = outcome.observation;
            }
            returns.push(total);
        }
        Ok(returns)
    }

    fn begin_episode(&mut self) -> Result<Array1<f32>> {
        self.phase = EpisodePhase::AwaitingReset;
        self.episode = EpisodeStats::default();
        match self.env.reset() {
            Ok(state) => {
                self.phase = EpisodePhase::Stepping;
                trace!("episode {} started", self.episode_index);
                Ok(state)
            }
            Err(err) => {
                warn!("environment reset failed: {}", err);
                Err(err)
            }
        }
    }

    fn abandon_episode(&mut self) {
        self.phase = EpisodePhase::AwaitingReset;
        self.current_state = None;
        self.episode = EpisodeStats::default();
    }

    fn finish_episode(&mut self, epsilon: f32, truncated: bool) -> TrainingRecord {
        let record = TrainingRecord {
            episode_index: self.episode_index,
            total_reward: self.episode.raw_return,
            clipped_reward: self.episode.clipped_return,
            loss: self.episode.mean_loss(),
            epsilon,
            global_step: self.global_step,
            episode_steps: self.episode.steps,
            truncated,
        };
        self.metrics.record(&record);

        self.phase = EpisodePhase::Terminal;
        self.current_state = None;
        self.episodes_completed += 1;
        self.episode_index += 1;
        record
    }

    /// One learning update. `Ok(None)` when the buffer is still warming up.
    fn learn(&mut self) -> Result<Option<LearnOutcome>> {
        if self.replay.len() < self.config.learning_starts() {
            return Ok(None);
        }
        if !self.warmed_up {
            self.warmed_up = true;
            debug!("warm-up complete with {} transitions at step {}", self.replay.len(), self.global_step);
        }

        let state_dim = self.approximator.state_dim();
        let batch_size = self.config.batch_size;
        let mut states = Array2::zeros((batch_size, state_dim));
        let mut next_states = Array2::zeros((batch_size, state_dim));
        let mut actions = Vec::with_capacity(batch_size);
        let mut rewards = Array1::zeros(batch_size);
        let mut dones = Vec::with_capacity(batch_size);

        {
            let batch = match self.replay.sample(batch_size, &mut self.rng) {
                Ok(batch) => batch,
                Err(err) if err.is_recoverable() => {
                    trace!("skipping update: {}", err);
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
            for (i, transition) in batch.iter().enumerate() {
                if transition.state.len() != state_dim || transition.next_state.len() != state_dim {
                    return Err(DqnError::dimension_mismatch(
                        format!("state width {}", state_dim),
                        format!("{} / {}", transition.state.len(), transition.next_state.len()),
                    ));
                }
                states.row_mut(i).assign(&transition.state);
                next_states.row_mut(i).assign(&transition.next_state);
                actions.push(transition.action);
                rewards[i] = transition.reward;
                dones.push(transition.done);
            }
        }

        let next_q = self.approximator.evaluate(NetworkId::Target, next_states.view())?;
        let targets = compute_targets(rewards.view(), next_q.view(), &dones, self.config.gamma)?;
        let loss = self.approximator.update(states.view(), &actions, targets.view())?;
        self.learn_steps += 1;

        let synced = self.learn_steps % self.config.target_sync_interval == 0;
        if synced {
            self.approximator.sync_target()?;
            self.target_syncs += 1;
        }
        Ok(Some(LearnOutcome { loss, synced }))
    }

    fn maybe_checkpoint(&mut self) -> Result<()> {
        let interval = match self.config.checkpoint_interval {
            Some(interval) => interval,
            None => return Ok(()),
        };
        if self.global_step % interval != 0 {
            return Ok(());
        }
        let progress = self.progress();
        if let Some(sink) = self.checkpointer.as_mut() {
            sink.save(&self.approximator, &progress)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_clip_reward_examples() {
        let inputs = [-50.0, -1.0, 0.0, 0.5, 1.0, 200.0];
        let clipped: Vec<f32> = inputs.iter().map(|&r| clip_reward(r)).collect();
        assert_eq!(clipped, vec![-1.0, -1.0, 0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_terminal_target_is_reward() {
        let next_q = array![[100.0, -3.0], [2.0, 5.0]];
        let targets = compute_targets(array![0.5, 1.0].view(), next_q.view(), &[true, false], 0.9).unwrap();
        assert_eq!(targets[0], 0.5);
        assert!((targets[1] - (1.0 + 0.9 * 5.0)).abs() < 1e-6);
    }

    #[test]
    fn test_terminal_target_ignores_gamma() {
        let next_q = array![[7.0, 9.0]];
        for gamma in [0.0, 0.5, 1.0] {
            let targets = compute_targets(array![-1.0].view(), next_q.view(), &[true], gamma).unwrap();
            assert_eq!(targets[0], -1.0);
        }
    }

    #[test]
    fn test_compute_targets_shape_checks() {
        let next_q = array![[1.0, 2.0]];
        assert!(compute_targets(array![0.0, 1.0].view(), next_q.view(), &[false, false], 0.9).is_err());
        assert!(compute_targets(array![0.0].view(), next_q.view(), &[], 0.9).is_err());
    }
}
