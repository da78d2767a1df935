//! Train an [`Agent`].
mod checkpoint;
mod config;
mod progress;

use crate::{error::HarnessError, record::Recorder, Agent, Env, Evaluator, ModelStore, StopSignal, TrainCallback};
use anyhow::Result;
pub use checkpoint::CheckpointCallback;
pub use config::TrainerConfig;
use log::{info, warn};
pub use progress::ProgressCallback;
use std::path::Path;

/// Drives a training run around an opaque agent.
///
/// The trainer registers the checkpoint handler and then the progress
/// handler with the agent's learning loop; the agent invokes them at its own
/// step cadence. A cancellation signal raised during learning is caught
/// exactly once here and converted into a graceful stop: the accumulated
/// progress statistics are flushed and the final save runs exactly as on
/// normal completion.
pub struct Trainer {
    config: TrainerConfig,
    stop: StopSignal,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Self {
        Self {
            config,
            stop: StopSignal::new(),
        }
    }

    /// The stop signal observed by the training loop. Clone it into a signal
    /// handler to request a graceful stop.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Trains the agent for the configured timestep budget.
    ///
    /// `eval_env_config` configures the environment used for in-training
    /// evaluation snapshots; it is only built when the progress handler is
    /// enabled. If a non-empty model name is configured, the agent's final
    /// state is persisted under that identifier unconditionally, even when
    /// the timestep budget was not reached.
    pub fn train<E, A>(
        &self,
        agent: &mut A,
        store: &ModelStore,
        recorder: Box<dyn Recorder>,
        eval_env_config: &E::Config,
    ) -> Result<()>
    where
        E: Env,
        A: Agent<E>,
    {
        let config = &self.config;

        let mut checkpoint = if config.save_freq > 0 {
            let prefix = if config.model_name.is_empty() {
                "model"
            } else {
                config.model_name.as_str()
            };
            Some(CheckpointCallback::new(
                store.clone(),
                prefix,
                config.save_freq as usize,
            ))
        } else {
            None
        };

        let mut progress = if config.hist_freq > 0 {
            let evaluator =
                Evaluator::build(eval_env_config, config.seed, config.eval_episodes, false)?;
            let dump_name = if config.model_name.is_empty() {
                "progress"
            } else {
                config.model_name.as_str()
            };
            let dump_path = Path::new(&config.log_dir).join(format!("{}.csv", dump_name));
            Some(ProgressCallback::new(
                config.hist_freq as usize,
                evaluator,
                recorder,
                dump_path,
            ))
        } else {
            None
        };

        info!("Beginning training.");
        let result = {
            // Registration order is fixed: checkpoint before progress, so a
            // checkpoint at step N precedes the progress entry for step N.
            let mut callbacks: Vec<&mut dyn TrainCallback<E, A>> = Vec::with_capacity(2);
            if let Some(cb) = checkpoint.as_mut() {
                callbacks.push(cb);
            }
            if let Some(cb) = progress.as_mut() {
                callbacks.push(cb);
            }
            agent.learn(
                config.n_timesteps,
                config.log_interval,
                &mut callbacks,
                &self.stop,
            )
        };

        match result {
            Ok(steps) => info!("Training finished after {} environment steps.", steps),
            Err(e) => match e.downcast_ref::<HarnessError>() {
                Some(HarnessError::Interrupted) => {
                    warn!("Training interrupted; keeping partial progress.")
                }
                _ => return Err(e),
            },
        }

        if let Some(progress) = progress.as_mut() {
            progress.dump()?;
        }

        if config.model_name.is_empty() {
            info!("No model name given; skipping final save.");
        } else {
            info!("Saving final model.");
            let path = store.model_path(&config.model_name);
            agent.save_params(&path)?;
            info!("Final model saved to {:?}", path);
        }

        Ok(())
    }
}
