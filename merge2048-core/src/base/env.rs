//! Environment.
use super::{Act, Info, Obs, Step};
use anyhow::Result;

/// Represents an environment, typically an MDP.
///
/// In addition to the usual reset/step/render protocol, the environment
/// exposes [`peak_tile_rank`](Env::peak_tile_rank), the exponent of the
/// largest tile reached in the current episode. The evaluator uses it as the
/// index into the outcome histogram.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Observation of the environment.
    type Obs: Obs;

    /// Action of the environment.
    type Act: Act;

    /// Information attached to a [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: u64) -> Result<Self>
    where
        Self: Sized;

    /// Starts a new episode and returns the initial observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Performs an environment step.
    fn step(&mut self, act: &Self::Act) -> Step<Self>
    where
        Self: Sized;

    /// Renders the current state, for human observation.
    fn render(&self);

    /// The exponent of the largest tile reached in the current episode.
    ///
    /// A real game never reports 0 since the smallest tile is 2^1.
    fn peak_tile_rank(&self) -> usize;
}
