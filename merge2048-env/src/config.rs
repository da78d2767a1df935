//! Configuration of [`TileEnv`](crate::TileEnv).
use serde::{Deserialize, Serialize};

/// Configuration of the tile-merging environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileEnvConfig {
    /// Encode observations as one-hot planes per cell instead of raw ranks.
    pub one_hot: bool,
    /// Penalty subtracted as reward when a move is rejected.
    pub invalid_move_penalty: f32,
}

impl Default for TileEnvConfig {
    fn default() -> Self {
        Self {
            one_hot: true,
            invalid_move_penalty: 1.0,
        }
    }
}

impl TileEnvConfig {
    /// Sets the observation encoding.
    pub fn one_hot(mut self, one_hot: bool) -> Self {
        self.one_hot = one_hot;
        self
    }

    /// Sets the rejected-move penalty.
    pub fn invalid_move_penalty(mut self, penalty: f32) -> Self {
        self.invalid_move_penalty = penalty;
        self
    }
}
