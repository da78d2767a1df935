#![warn(missing_docs)]
//! Training and evaluation harness for a reinforcement-learning agent playing
//! a deterministic tile-merging puzzle game.
//!
//! This crate is backend-agnostic: the learning algorithm and the game rules
//! are consumed through the [`Agent`] and [`Env`] traits. The harness itself
//! consists of three components:
//!
//! * [`ModelStore`] -- resume-if-present, create-otherwise resolution of a
//!   model identifier to an agent, plus the on-disk artifact layout.
//! * [`Trainer`] -- drives [`Agent::learn`] with checkpoint and progress
//!   callbacks, and guarantees a final save even when training is stopped
//!   by a cancellation signal.
//! * [`Evaluator`] -- repeated episode rollouts against a fixed agent and
//!   environment, aggregating episode scores and a histogram of the peak
//!   tile rank reached per episode.
pub mod error;
pub mod record;

mod base;
pub use base::{Act, Agent, Env, Info, Obs, Policy, Step, TrainCallback};

mod stop;
pub use stop::StopSignal;

mod eval;
pub use eval::{EvalReport, Evaluator, TileHistogram, MAX_TILE_RANK};

mod store;
pub use store::ModelStore;

mod trainer;
pub use trainer::{CheckpointCallback, ProgressCallback, Trainer, TrainerConfig};

#[cfg(test)]
pub(crate) mod testing;
