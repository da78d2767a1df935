//! Configuration of [`Trainer`](super::Trainer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of one training run.
///
/// Intervals are in environment steps. `save_freq` and `hist_freq` disable
/// their handler entirely when not positive.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Total timestep budget of the run.
    pub n_timesteps: usize,

    /// Interval of episode-statistics logging.
    pub log_interval: usize,

    /// Interval of checkpoint saves; no checkpoints when <= 0.
    pub save_freq: i64,

    /// Interval of progress accumulation and evaluation snapshots;
    /// the progress handler is disabled when <= 0.
    pub hist_freq: i64,

    /// Number of episodes per in-training evaluation snapshot.
    pub eval_episodes: usize,

    /// Model identifier for the final save and the checkpoint name prefix.
    /// With an empty name the final save is skipped.
    pub model_name: String,

    /// Directory for the progress dump.
    pub log_dir: String,

    /// Random seed of the snapshot-evaluation environment.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_timesteps: 10_000_000,
            log_interval: 10_000,
            save_freq: 100_000,
            hist_freq: 100,
            eval_episodes: 100,
            model_name: "".to_string(),
            log_dir: "logs".to_string(),
            seed: 0,
        }
    }
}

impl TrainerConfig {
    /// Sets the total timestep budget.
    pub fn n_timesteps(mut self, v: usize) -> Self {
        self.n_timesteps = v;
        self
    }

    /// Sets the logging interval.
    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = v;
        self
    }

    /// Sets the checkpoint interval.
    pub fn save_freq(mut self, v: i64) -> Self {
        self.save_freq = v;
        self
    }

    /// Sets the progress-handler interval.
    pub fn hist_freq(mut self, v: i64) -> Self {
        self.hist_freq = v;
        self
    }

    /// Sets the number of episodes per evaluation snapshot.
    pub fn eval_episodes(mut self, v: usize) -> Self {
        self.eval_episodes = v;
        self
    }

    /// Sets the model identifier.
    pub fn model_name(mut self, v: impl Into<String>) -> Self {
        self.model_name = v.into();
        self
    }

    /// Sets the progress-dump directory.
    pub fn log_dir(mut self, v: impl Into<String>) -> Self {
        self.log_dir = v.into();
        self
    }

    /// Sets the snapshot-evaluation seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Constructs [`TrainerConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
