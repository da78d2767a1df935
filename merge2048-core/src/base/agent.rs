//! Agent.
use super::{Env, Policy};
use crate::{record::Record, StopSignal};
use anyhow::Result;
use std::path::Path;

/// A handler invoked by the agent's learning loop.
///
/// Handlers are registered by [`Trainer::train`](crate::Trainer::train)
/// before learning starts and are invoked by the agent at every environment
/// step, in registration order. The trainer registers the checkpoint handler
/// before the progress handler, so checkpoint artifacts and logged step
/// counts stay consistent.
pub trait TrainCallback<E: Env, A: Agent<E>> {
    /// Invoked after each environment step during learning.
    ///
    /// `env_steps` counts from 1. `record` carries the metrics the agent
    /// accumulated for this step; it is empty on most steps.
    fn on_step(&mut self, agent: &A, env_steps: usize, record: &Record) -> Result<()>;
}

/// A trainable policy on an environment.
///
/// The agent owns its learning algorithm, its experience buffer and the
/// environment instance it trains against; all of these are opaque to the
/// harness. The harness only drives the lifecycle: learn, persist, restore.
pub trait Agent<E: Env>: Policy<E> {
    /// Runs the learning loop for `total_timesteps` environment steps.
    ///
    /// The agent is the scheduler: it invokes the given callbacks at its own
    /// step cadence. Episode statistics are logged every `log_interval`
    /// steps. When `stop` is raised, the loop returns
    /// [`HarnessError::Interrupted`] so the caller can run its graceful-stop
    /// path; progress made before the interruption is kept in the agent.
    ///
    /// Returns the number of environment steps performed.
    ///
    /// [`HarnessError::Interrupted`]: crate::error::HarnessError::Interrupted
    fn learn(
        &mut self,
        total_timesteps: usize,
        log_interval: usize,
        callbacks: &mut [&mut dyn TrainCallback<E, Self>],
        stop: &StopSignal,
    ) -> Result<usize>
    where
        Self: Sized;

    /// Saves the parameters of the agent to the given file.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Loads the parameters of the agent from the given file.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
