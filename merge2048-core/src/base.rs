//! Core abstractions of the harness.
mod agent;
mod env;
mod policy;
mod step;
use std::fmt::Debug;

pub use agent::{Agent, TrainCallback};
pub use env::Env;
pub use policy::Policy;
pub use step::{Info, Step};

/// An observation of the environment.
///
/// The harness only ever treats observations as flat feature vectors, so the
/// trait exposes the features directly. How the environment encodes the board
/// into them (one-hot per cell or raw exponents) is its own business.
pub trait Obs: Clone + Debug {
    /// Returns the observation as a flat feature vector.
    fn features(&self) -> &[f32];

    /// Returns the number of features.
    fn dim(&self) -> usize {
        self.features().len()
    }
}

/// An action of the environment.
///
/// The action set is finite and fixed for the lifetime of the environment,
/// which lets the harness sample a uniformly random action during the
/// action-repair step of evaluation.
pub trait Act: Clone + Debug {
    /// The number of actions in the action set.
    fn n_actions() -> usize;

    /// Returns the action with the given index, `ix < Self::n_actions()`.
    fn from_index(ix: usize) -> Self;

    /// Returns the index of this action.
    fn index(&self) -> usize;

    /// Samples a uniformly random action from the action set.
    fn sample_uniform() -> Self {
        Self::from_index(fastrand::usize(..Self::n_actions()))
    }
}
