use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::warn;

use super::{MetricsSink, TrainingRecord};

/// Appends one CSV row per episode to `<log_dir>/<run_name>/episodes.csv`.
pub struct CsvMetricsWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    started: Instant,
}

impl CsvMetricsWriter {
    /// Create the run directory and write the header row
    ///
    /// # Arguments
    /// * `log_dir` - Directory to save logs
    /// * `run_name` - Name of this training run
    pub fn new<P: AsRef<Path>>(log_dir: P, run_name: &str) -> std::io::Result<Self> {
        let run_dir = log_dir.as_ref().join(run_name);
        create_dir_all(&run_dir)?;
        let path = run_dir.join("episodes.csv");

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(
            writer,
            "episode,global_step,episode_steps,total_reward,clipped_reward,loss,epsilon,truncated,wall_time"
        )?;
        writer.flush()?;

        Ok(CsvMetricsWriter {
            path,
            writer,
            started: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_row(&mut self, record: &TrainingRecord) -> std::io::Result<()> {
        let loss = record.loss.map(|l| l.to_string()).unwrap_or_default();
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{},{:.3}",
            record.episode_index,
            record.global_step,
            record.episode_steps,
            record.total_reward,
            record.clipped_reward,
            loss,
            record.epsilon,
            record.truncated,
            self.started.elapsed().as_secs_f64(),
        )?;
        self.writer.flush()
    }
}

impl MetricsSink for CsvMetricsWriter {
    fn record(&mut self, record: &TrainingRecord) {
        if let Err(err) = self.write_row(record) {
            warn!("failed to write metrics row to {}: {}", self.path.display(), err);
        }
    }
}
