//! Periodic persistence of the learner.
//!
//! The trainer hands its approximator and a [`TrainingProgress`] snapshot to a
//! [`CheckpointSink`] every `checkpoint_interval` agent steps. A run resumes by
//! loading the pair and its progress and handing both to a new trainer through
//! [`Trainer::with_progress`](crate::trainer::Trainer::with_progress).

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Serialize, Deserialize};

use crate::error::{DqnError, Result};
use crate::network::ValueNetworkPair;

/// Counters describing how far training has progressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgress {
    pub global_step: usize,
    pub learn_steps: usize,
    pub episodes_completed: usize,
    /// Raw simulator frames consumed by training
    pub frames: usize,
    pub epsilon: f32,
}

/// Receives checkpoint requests from the trainer.
pub trait CheckpointSink<A: ?Sized> {
    fn save(&mut self, approximator: &A, progress: &TrainingProgress) -> Result<()>;
}

impl<A: ?Sized, C: CheckpointSink<A> + ?Sized> CheckpointSink<A> for Box<C> {
    fn save(&mut self, approximator: &A, progress: &TrainingProgress) -> Result<()> {
        (**self).save(approximator, progress)
    }
}

#[derive(Deserialize)]
struct Checkpoint {
    progress: TrainingProgress,
    pair: ValueNetworkPair,
}

/// Serialized layout of [`Checkpoint`], borrowing instead of owning.
#[derive(Serialize)]
struct CheckpointRef<'a> {
    progress: &'a TrainingProgress,
    pair: &'a ValueNetworkPair,
}

/// Writes `checkpoint-<global_step>.bin` files into a directory, keeping at
/// most `keep_last` of them.
pub struct FileCheckpointer {
    dir: PathBuf,
    keep_last: Option<usize>,
    written: Vec<PathBuf>,
}

impl FileCheckpointer {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(FileCheckpointer {
            dir: dir.as_ref().to_path_buf(),
            keep_last: None,
            written: Vec::new(),
        })
    }

    pub fn keep_last(mut self, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(DqnError::invalid_parameter("keep_last", "must be greater than 0"));
        }
        self.keep_last = Some(count);
        Ok(self)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written by this checkpointer that still exist, oldest first.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn path_for(&self, global_step: usize) -> PathBuf {
        self.dir.join(format!("checkpoint-{}.bin", global_step))
    }

    /// Load a checkpoint file written by [`FileCheckpointer`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<(ValueNetworkPair, TrainingProgress)> {
        let data = fs::read(path)?;
        let checkpoint: Checkpoint = bincode::deserialize(&data)?;
        if !checkpoint.pair.online().same_shape(checkpoint.pair.target()) {
            return Err(DqnError::Serialization("online and target shapes differ".to_string()));
        }
        Ok((checkpoint.pair, checkpoint.progress))
    }

    /// Checkpoint in `dir` with the highest step number, if any.
    pub fn latest<P: AsRef<Path>>(dir: P) -> Result<Option<PathBuf>> {
        let mut best: Option<(usize, PathBuf)> = None;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let step = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("checkpoint-"))
                .and_then(|rest| rest.strip_suffix(".bin"))
                .and_then(|digits| digits.parse::<usize>().ok());
            if let Some(step) = step {
                if best.as_ref().map_or(true, |(b, _)| step > *b) {
                    best = Some((step, path));
                }
            }
        }
        Ok(best.map(|(_, path)| path))
    }
}

impl CheckpointSink<ValueNetworkPair> for FileCheckpointer {
    fn save(&mut self, pair: &ValueNetworkPair, progress: &TrainingProgress) -> Result<()> {
        let path = self.path_for(progress.global_step);
        let checkpoint = CheckpointRef { progress, pair };
        fs::write(&path, bincode::serialize(&checkpoint)?)?;
        info!("checkpoint written to {}", path.display());

        self.written.retain(|p| p != &path);
        self.written.push(path);
        if let Some(keep) = self.keep_last {
            while self.written.len() > keep {
                let stale = self.written.remove(0);
                debug!("removing old checkpoint {}", stale.display());
                fs::remove_file(&stale)?;
            }
        }
        Ok(())
    }
}
