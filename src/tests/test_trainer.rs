use tempfile::tempdir;

use crate::builders::ValueNetworkPairBuilder;
use crate::checkpoint::{CheckpointSink, FileCheckpointer, TrainingProgress};
use crate::config::TrainerConfig;
use crate::error::{DqnError, Result};
use crate::metrics::{NullSink, TrainingRecord};
use crate::network::ValueNetworkPair;
use crate::trainer::{EpisodePhase, Trainer};
use super::fixtures::{ChainEnv, Corridor};

fn small_config() -> TrainerConfig {
    TrainerConfig::default()
        .with_replay_capacity(200)
        .with_batch_size(8)
        .with_warmup_size(20)
        .with_epsilon(1.0, 0.1, 100)
        .with_target_sync_interval(5)
        .with_frame_skip(1)
        .with_total_steps_budget(1000)
        .with_learning_rate(0.01)
        .with_hidden_layers(&[16])
        .with_seed(17)
}

/// Checkpoint sink whose storage is always full.
struct FullDisk;

impl CheckpointSink<ValueNetworkPair> for FullDisk {
    fn save(&mut self, _pair: &ValueNetworkPair, _progress: &TrainingProgress) -> Result<()> {
        Err(DqnError::Io("no space left on device".to_string()))
    }
}

fn chain_trainer(config: TrainerConfig, env: ChainEnv) -> Trainer<ChainEnv, ValueNetworkPair, Vec<TrainingRecord>> {
    Trainer::from_config(config, env, Vec::new()).unwrap()
}

#[test]
fn test_starts_awaiting_reset() {
    let trainer = chain_trainer(small_config(), ChainEnv::new(2, 3, 10, 0.0));
    assert_eq!(trainer.phase(), EpisodePhase::AwaitingReset);
    assert_eq!(trainer.global_step(), 0);
    assert_eq!(trainer.epsilon(), 1.0);
}

#[test]
fn test_rejects_mismatched_environment() {
    let pair = ValueNetworkPairBuilder::new().input_dim(4).num_actions(2).hidden_layers(&[8]).seed(0).build().unwrap();
    let result = Trainer::new(small_config(), ChainEnv::new(3, 2, 10, 0.0), pair, NullSink);
    assert!(matches!(result, Err(DqnError::DimensionMismatch { .. })));

    let pair = ValueNetworkPairBuilder::new().input_dim(3).num_actions(2).hidden_layers(&[8]).seed(0).build().unwrap();
    let result = Trainer::new(small_config(), ChainEnv::new(3, 4, 10, 0.0), pair, NullSink);
    assert!(matches!(result, Err(DqnError::DimensionMismatch { .. })));
}

#[test]
fn test_rejects_invalid_config() {
    let config = small_config().with_batch_size(0);
    assert!(Trainer::from_config(config, ChainEnv::new(2, 2, 10, 0.0), NullSink).is_err());
}

#[test]
fn test_no_learning_before_warmup() {
    let config = small_config().with_total_steps_budget(19);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 1000, 0.0));
    let summary = trainer.run().unwrap();
    assert_eq!(summary.global_steps, 19);
    assert_eq!(summary.learn_steps, 0);
    assert_eq!(trainer.replay().len(), 19);
    assert_eq!(trainer.approximator().updates(), 0);
}

#[test]
fn test_learning_starts_at_warmup_and_syncs_every_interval() {
    let config = small_config().with_total_steps_budget(30);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 1000, 0.0));
    let summary = trainer.run().unwrap();
    // steps 20..=30 each learn once
    assert_eq!(summary.learn_steps, 11);
    assert_eq!(summary.target_syncs, 2);
    assert_eq!(trainer.approximator().syncs(), 2);
}

#[test]
fn test_warmup_below_batch_waits_for_batch() {
    let config = small_config().with_warmup_size(2).with_batch_size(8).with_total_steps_budget(10);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 1000, 0.0));
    let summary = trainer.run().unwrap();
    assert_eq!(summary.learn_steps, 3);
}

#[test]
fn test_train_frequency() {
    let config = small_config().with_total_steps_budget(40);
    let mut config = config;
    config.train_frequency = 4;
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 1000, 0.0));
    let summary = trainer.run().unwrap();
    // steps 20, 24, ..., 40
    assert_eq!(summary.learn_steps, 6);
}

#[test]
fn test_target_frozen_between_syncs_and_equal_after() {
    let config = small_config().with_total_steps_budget(60);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 1000, 0.3));
    let mut frozen = trainer.approximator().target().clone();

    while !trainer.is_finished() {
        let report = trainer.step().unwrap();
        let pair = trainer.approximator();
        if report.synced {
            assert_eq!(pair.online(), pair.target());
            assert_eq!(trainer.learn_steps() % 5, 0);
            frozen = pair.target().clone();
        } else {
            assert_eq!(pair.target(), &frozen);
        }
    }
    assert_eq!(trainer.target_syncs(), 41 / 5);
}

#[test]
fn test_rewards_are_clipped_before_storage() {
    let config = small_config().with_total_steps_budget(12);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 4, 5.0));
    trainer.run().unwrap();

    assert!(trainer.replay().iter().all(|t| t.reward == 1.0));
    let records = trainer.metrics();
    assert_eq!(records.len(), 3);
    for record in records {
        assert_eq!(record.total_reward, 20.0);
        assert_eq!(record.clipped_reward, 4.0);
    }
}

#[test]
fn test_negative_rewards_clip_to_minus_one() {
    let config = small_config().with_frame_skip(3).with_total_steps_budget(2);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 100, -0.5));
    let report = trainer.step().unwrap();
    assert_eq!(report.reward, -1.5);
    assert_eq!(report.clipped_reward, -1.0);
}

#[test]
fn test_episode_records_and_indices() {
    let config = small_config().with_frame_skip(2).with_total_steps_budget(9);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 6, 1.0));
    trainer.run().unwrap();

    let records = trainer.metrics();
    let indices: Vec<usize> = records.iter().map(|r| r.episode_index).collect();
    let steps: Vec<usize> = records.iter().map(|r| r.global_step).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(steps, vec![3, 6, 9]);
    assert!(records.iter().all(|r| !r.truncated && r.episode_steps == 3));
    assert_eq!(trainer.episodes_completed(), 3);
    assert_eq!(trainer.env().frames(), 18);
    assert_eq!(trainer.env().inner().resets, 3);

    let terminal: Vec<bool> = trainer.replay().iter().map(|t| t.done).collect();
    assert_eq!(terminal, vec![false, false, true, false, false, true, false, false, true]);
}

#[test]
fn test_terminal_phase_then_reset() {
    let config = small_config().with_total_steps_budget(10);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 2, 0.0));

    trainer.step().unwrap();
    assert_eq!(trainer.phase(), EpisodePhase::Stepping);
    let report = trainer.step().unwrap();
    assert!(report.episode.is_some());
    assert_eq!(trainer.phase(), EpisodePhase::Terminal);
    assert_eq!(trainer.episode_index(), 1);

    trainer.step().unwrap();
    assert_eq!(trainer.phase(), EpisodePhase::Stepping);
    assert_eq!(trainer.env().inner().resets, 2);
}

#[test]
fn test_budget_cut_episode_is_truncated() {
    let config = small_config().with_total_steps_budget(5);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 100, 0.0));
    trainer.run().unwrap();

    let records = trainer.metrics();
    assert_eq!(records.len(), 1);
    assert!(records[0].truncated);
    assert_eq!(records[0].episode_steps, 5);
    assert!(trainer.replay().iter().all(|t| !t.done));
    assert!(matches!(trainer.step(), Err(DqnError::InvalidParameter { .. })));
}

#[test]
fn test_time_limit_bootstraps() {
    let config = small_config().with_max_episode_steps(4).with_total_steps_budget(8);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 100, 0.0));
    trainer.run().unwrap();

    let records = trainer.metrics();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.truncated && r.episode_steps == 4));
    assert!(trainer.replay().iter().all(|t| !t.done));
}

#[test]
fn test_run_episode_returns_record() {
    let config = small_config();
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 7, 1.0));
    let record = trainer.run_episode().unwrap();
    assert_eq!(record.episode_index, 0);
    assert_eq!(record.episode_steps, 7);
    assert_eq!(record.total_reward, 7.0);
    assert_eq!(record.loss, None);
    assert_eq!(trainer.metrics().len(), 1);
}

#[test]
fn test_epsilon_follows_schedule() {
    let config = small_config().with_epsilon(1.0, 0.0, 10).with_total_steps_budget(15);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 1000, 0.0));
    for step in 0..15 {
        let report = trainer.step().unwrap();
        let expected = if step >= 10 { 0.0 } else { 1.0 - step as f32 / 10.0 };
        assert!((report.epsilon - expected).abs() < 1e-6);
    }
}

#[test]
fn test_environment_error_aborts_episode() {
    let mut env = ChainEnv::new(2, 2, 100, 0.0);
    env.malformed_at = Some(3);
    let mut trainer = chain_trainer(small_config(), env);

    trainer.step().unwrap();
    trainer.step().unwrap();
    assert!(matches!(trainer.step(), Err(DqnError::Environment(_))));
    assert_eq!(trainer.phase(), EpisodePhase::AwaitingReset);
    assert_eq!(trainer.global_step(), 2);
    assert_eq!(trainer.replay().len(), 2);
    assert!(trainer.metrics().is_empty());

    trainer.step().unwrap();
    assert_eq!(trainer.env().inner().resets, 2);
    assert_eq!(trainer.episode_index(), 0);
}

#[test]
fn test_nan_network_surfaces_instability() {
    let mut pair = ValueNetworkPairBuilder::new().input_dim(2).num_actions(2).hidden_layers(&[4]).seed(3).build().unwrap();
    pair.online_mut().layers_mut()[0].weights.fill(f32::NAN);
    let config = small_config().with_epsilon(0.0, 0.0, 1);
    let mut trainer = Trainer::new(config, ChainEnv::new(2, 2, 10, 0.0), pair, NullSink).unwrap();
    assert!(matches!(trainer.step(), Err(DqnError::NumericInstability(_))));
}

#[test]
fn test_evaluate_does_not_store_or_learn() {
    let config = small_config().with_max_episode_steps(50);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 5, 2.0));
    trainer.step().unwrap();
    trainer.step().unwrap();

    let returns = trainer.evaluate(3).unwrap();
    assert_eq!(returns, vec![10.0, 10.0, 10.0]);
    assert_eq!(trainer.replay().len(), 2);
    assert_eq!(trainer.global_step(), 2);
    assert_eq!(trainer.learn_steps(), 0);
    assert_eq!(trainer.phase(), EpisodePhase::AwaitingReset);
    assert!(trainer.metrics().is_empty());
}

#[test]
fn test_checkpoints_written_on_interval() {
    let dir = tempdir().unwrap();
    let config = small_config().with_checkpoint_interval(25).with_total_steps_budget(60);
    let checkpointer = FileCheckpointer::new(dir.path()).unwrap();
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 10, 0.0)).with_checkpointer(checkpointer);
    trainer.run().unwrap();

    for step in [25, 50] {
        let path = dir.path().join(format!("checkpoint-{}.bin", step));
        let (_, progress) = FileCheckpointer::load(&path).unwrap();
        assert_eq!(progress.global_step, step);
    }
    assert!(!dir.path().join("checkpoint-60.bin").exists());
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let run = || {
        let config = small_config().with_total_steps_budget(80);
        let mut trainer = chain_trainer(config, ChainEnv::new(2, 3, 9, 0.5));
        trainer.run().unwrap();
        (trainer.env().inner().actions_seen.clone(), trainer.approximator().online().clone())
    };
    assert_eq!(run(), run());
}

#[test]
fn test_corridor_training_runs() {
    let config = small_config()
        .with_replay_capacity(500)
        .with_batch_size(16)
        .with_warmup_size(50)
        .with_epsilon(1.0, 0.05, 400)
        .with_max_episode_steps(30)
        .with_total_steps_budget(600);
    let mut trainer = Trainer::from_config(config, Corridor::new(5), Vec::new()).unwrap();
    let summary = trainer.run().unwrap();

    assert_eq!(summary.global_steps, 600);
    assert_eq!(summary.learn_steps, 551);
    assert!(summary.episodes_completed > 0);
    assert!(trainer.metrics().iter().any(|r| r.loss.is_some()));
    assert!(trainer.approximator().online().is_finite());
}

#[test]
fn test_checkpoint_failure_on_terminal_step_still_records_episode() {
    let config = small_config().with_checkpoint_interval(3);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 3, 1.0)).with_checkpointer(FullDisk);
    trainer.step().unwrap();
    trainer.step().unwrap();

    assert!(matches!(trainer.step(), Err(DqnError::Io(_))));
    assert_eq!(trainer.global_step(), 3);
    assert_eq!(trainer.phase(), EpisodePhase::Terminal);
    assert_eq!(trainer.episodes_completed(), 1);
    assert_eq!(trainer.episode_index(), 1);
    assert_eq!(trainer.metrics().len(), 1);
    assert_eq!(trainer.metrics()[0].episode_steps, 3);
    assert_eq!(trainer.metrics()[0].total_reward, 3.0);
}

#[test]
fn test_checkpoint_failure_mid_episode_keeps_episode_running() {
    let config = small_config().with_checkpoint_interval(2);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 10, 1.0)).with_checkpointer(FullDisk);
    trainer.step().unwrap();
    assert!(trainer.step().is_err());
    assert_eq!(trainer.phase(), EpisodePhase::Stepping);

    trainer.step().unwrap();
    assert_eq!(trainer.global_step(), 3);
    assert_eq!(trainer.env().inner().resets, 1);
    assert_eq!(trainer.env().inner().t, 3);
}

#[test]
fn test_evaluation_frames_not_counted_as_training() {
    let config = small_config().with_frame_skip(2).with_total_steps_budget(10);
    let mut trainer = chain_trainer(config, ChainEnv::new(2, 2, 4, 0.0));
    let summary = trainer.run().unwrap();
    assert_eq!(summary.frames, 20);

    trainer.evaluate(4).unwrap();
    assert_eq!(trainer.env().frames(), 36);
    assert_eq!(trainer.summary().frames, 20);
    assert_eq!(trainer.progress().frames, 20);
}

#[test]
fn test_with_progress_restores_counters() {
    let config = small_config().with_total_steps_budget(50);
    let mut first = chain_trainer(config.clone(), ChainEnv::new(2, 2, 10, 0.0));
    first.run().unwrap();
    let progress = first.progress();
    assert_eq!(progress.learn_steps, 31);

    let pair = first.into_approximator();
    let resumed = Trainer::new(config.with_total_steps_budget(80), ChainEnv::new(2, 2, 10, 0.0), pair, NullSink)
        .unwrap()
        .with_progress(progress);
    assert_eq!(resumed.global_step(), 50);
    assert_eq!(resumed.epsilon(), progress.epsilon);
    assert!((resumed.epsilon() - 0.55).abs() < 1e-6);
    assert_eq!(resumed.learn_steps(), 31);
    assert_eq!(resumed.target_syncs(), 6);
    assert_eq!(resumed.episode_index(), 5);
    assert_eq!(resumed.episodes_completed(), 5);
    assert_eq!(resumed.summary().frames, 50);
    assert_eq!(resumed.phase(), EpisodePhase::AwaitingReset);
    assert!(!resumed.is_finished());
}
