//! Progress accumulation and periodic evaluation snapshots.
use crate::{
    record::{Record, RecordValue, Recorder},
    Agent, Env, Evaluator, TileHistogram, TrainCallback, MAX_TILE_RANK,
};
use anyhow::{Context, Result};
use chrono::prelude::{DateTime, Local};
use log::info;
use std::path::PathBuf;

struct ProgressRow {
    env_steps: usize,
    timestamp: DateTime<Local>,
    mean_score: f32,
    histogram: TileHistogram,
}

/// Accumulates training statistics every `hist_freq` environment steps and
/// flushes them to durable storage once at the end of the run.
///
/// Each accumulation runs a lightweight evaluation snapshot against its own
/// environment instance and forwards the resulting scalars to the recorder.
pub struct ProgressCallback<E: Env> {
    hist_freq: usize,
    evaluator: Evaluator<E>,
    recorder: Box<dyn Recorder>,
    rows: Vec<ProgressRow>,
    dump_path: PathBuf,
    dumped: bool,
}

impl<E: Env> ProgressCallback<E> {
    /// Creates a progress handler. `hist_freq` must be positive; the trainer
    /// does not register the handler otherwise.
    pub fn new(
        hist_freq: usize,
        evaluator: Evaluator<E>,
        recorder: Box<dyn Recorder>,
        dump_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            hist_freq,
            evaluator,
            recorder,
            rows: Vec::new(),
            dump_path: dump_path.into(),
            dumped: false,
        }
    }

    /// Flushes the accumulated statistics to `dump_path` as CSV.
    ///
    /// The trainer calls this exactly once per run, after learning ended
    /// normally or was interrupted; further calls are no-ops.
    pub fn dump(&mut self) -> Result<()> {
        if self.dumped {
            return Ok(());
        }
        self.dumped = true;
        self.recorder.flush();

        if let Some(parent) = self.dump_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut wtr = csv::Writer::from_path(&self.dump_path)
            .with_context(|| format!("failed to create progress dump {:?}", self.dump_path))?;

        let mut header = vec!["env_steps".to_string(), "timestamp".to_string()];
        header.push("mean_score".to_string());
        for rank in 1..=MAX_TILE_RANK {
            header.push(format!("rank_{}", rank));
        }
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut fields = vec![
                row.env_steps.to_string(),
                row.timestamp.to_rfc3339(),
                row.mean_score.to_string(),
            ];
            for rank in 1..=MAX_TILE_RANK {
                fields.push(row.histogram.count(rank).to_string());
            }
            wtr.write_record(&fields)?;
        }
        wtr.flush()?;
        info!("Dumped progress statistics to {:?}", self.dump_path);
        Ok(())
    }

    /// Number of accumulated snapshots.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no snapshot has been accumulated yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<E: Env, A: Agent<E>> TrainCallback<E, A> for ProgressCallback<E> {
    fn on_step(&mut self, agent: &A, env_steps: usize, record: &Record) -> Result<()> {
        if !record.is_empty() {
            let mut record = record.clone();
            record.insert("env_steps", RecordValue::Scalar(env_steps as f32));
            self.recorder.write(record);
        }

        if env_steps % self.hist_freq == 0 {
            let report = self.evaluator.evaluate(agent)?;
            info!(
                "Evaluation snapshot at step {}: mean score {}",
                env_steps, report.mean_score
            );

            let mut record = Record::from_scalar("eval_score_mean", report.mean_score);
            record.insert("env_steps", RecordValue::Scalar(env_steps as f32));
            record.insert(
                "tile_histogram",
                RecordValue::Array1(report.histogram.counts().iter().map(|&c| c as f32).collect()),
            );
            self.recorder.write(record);

            self.rows.push(ProgressRow {
                env_steps,
                timestamp: Local::now(),
                mean_score: report.mean_score,
                histogram: report.histogram,
            });
        }
        Ok(())
    }
}
