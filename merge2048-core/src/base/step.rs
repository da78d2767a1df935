//! Environment step.
use super::Env;

/// Additional information attached to a step.
pub trait Info {
    /// The episode score reported by the environment.
    ///
    /// The evaluator records the terminal step's score for each episode.
    fn score(&self) -> f32;
}

/// An action, observation and reward tuple `(a_t, o_t+1, r_t)` emitted by the
/// environment at every interaction step.
pub struct Step<E: Env> {
    /// Action.
    pub act: E::Act,

    /// Observation after the action was applied.
    pub obs: E::Obs,

    /// Reward. A negative reward marks a rejected move.
    pub reward: f32,

    /// Flag denoting if the episode ended with this step.
    pub done: bool,

    /// Information defined by the environment.
    pub info: E::Info,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(act: E::Act, obs: E::Obs, reward: f32, done: bool, info: E::Info) -> Self {
        Step {
            act,
            obs,
            reward,
            done,
            info,
        }
    }
}
