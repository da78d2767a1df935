#![warn(missing_docs)]
//! A DQN agent for the merge2048 harness.
//!
//! The agent pairs a pure-Rust feed-forward Q-network with a prioritized
//! replay buffer and a double-Q target. It has no tensor backend: forward
//! and backward passes are plain loops over `f32` slices, which keeps the
//! persisted artifacts portable and the crate free of native dependencies.
mod config;
mod dqn;
mod nn;
mod replay;

pub use config::{DqnConfig, ExtractorKind, HyperparameterSet, LearnConfig, PolicyConfig};
pub use dqn::Dqn;
pub use nn::QNetwork;
pub use replay::{ReplayBuffer, SampledBatch};
