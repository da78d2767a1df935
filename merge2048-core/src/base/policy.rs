//! Policy.
use super::Env;

/// A policy on an environment.
///
/// Prediction is read-only: evaluation never mutates the agent. Exploration
/// noise, if any, lives inside [`Agent::learn`](super::Agent::learn) rather
/// than here, so a trained policy queried twice on the same observation
/// returns the same action.
pub trait Policy<E: Env> {
    /// Returns an action given an observation.
    fn predict(&self, obs: &E::Obs) -> E::Act;
}
