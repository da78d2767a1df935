//! Periodic checkpoint handler.
use crate::{record::Record, Agent, Env, ModelStore, TrainCallback};
use anyhow::Result;
use log::info;

/// Persists the agent's state every `save_freq` environment steps.
///
/// Artifacts are tagged with the step count: `{prefix}_{steps}.bin` under
/// the model store directory.
pub struct CheckpointCallback {
    store: ModelStore,
    prefix: String,
    save_freq: usize,
}

impl CheckpointCallback {
    /// Creates a checkpoint handler. `save_freq` must be positive; the
    /// trainer does not register the handler otherwise.
    pub fn new(store: ModelStore, prefix: impl Into<String>, save_freq: usize) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            save_freq,
        }
    }
}

impl<E: Env, A: Agent<E>> TrainCallback<E, A> for CheckpointCallback {
    fn on_step(&mut self, agent: &A, env_steps: usize, _record: &Record) -> Result<()> {
        if env_steps % self.save_freq == 0 {
            let path = self.store.checkpoint_path(&self.prefix, env_steps);
            agent.save_params(&path)?;
            info!("Saved checkpoint to {:?}", path);
        }
        Ok(())
    }
}
