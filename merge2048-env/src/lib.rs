#![warn(missing_docs)]
//! A deterministic 4x4 tile-merging puzzle environment.
//!
//! The board holds tiles whose values are powers of two. A step slides all
//! tiles in one of four directions; equal neighbors merge into a tile of the
//! doubled value, scoring its value. After every accepted move a new tile
//! spawns in a random empty cell. A move that changes nothing is rejected
//! and reported with a negative reward; the episode ends when no move can
//! change the board.
mod board;
mod config;

pub use board::{Direction, CELLS, SIDE};
pub use config::TileEnvConfig;

use anyhow::Result;
use board::Board;
use merge2048_core::{Act, Env, Info, Obs, Step};

/// Number of distinct ranks encoded per cell in one-hot observations.
const ONE_HOT_RANKS: usize = 16;

/// Observation of the board, either one-hot per cell or raw tile ranks.
#[derive(Clone, Debug)]
pub struct TileObs(Vec<f32>);

impl Obs for TileObs {
    fn features(&self) -> &[f32] {
        &self.0
    }
}

impl Act for Direction {
    fn n_actions() -> usize {
        Direction::ALL.len()
    }

    fn from_index(ix: usize) -> Self {
        Direction::ALL[ix]
    }

    fn index(&self) -> usize {
        Direction::ALL.iter().position(|d| d == self).unwrap()
    }
}

/// Step information: the episode score so far.
#[derive(Clone, Debug)]
pub struct TileInfo {
    /// Cumulative score of the current episode.
    pub score: f32,
}

impl Info for TileInfo {
    fn score(&self) -> f32 {
        self.score
    }
}

/// The tile-merging environment.
pub struct TileEnv {
    config: TileEnvConfig,
    board: Board,
    score: f32,
    rng: fastrand::Rng,
}

impl TileEnv {
    fn obs(&self) -> TileObs {
        if self.config.one_hot {
            let mut features = vec![0.0; CELLS * ONE_HOT_RANKS];
            for ix in 0..CELLS {
                features[ix * ONE_HOT_RANKS + self.board.rank(ix) as usize] = 1.0;
            }
            TileObs(features)
        } else {
            TileObs((0..CELLS).map(|ix| self.board.rank(ix) as f32).collect())
        }
    }

    fn info(&self) -> TileInfo {
        TileInfo { score: self.score }
    }
}

impl Env for TileEnv {
    type Config = TileEnvConfig;
    type Obs = TileObs;
    type Act = Direction;
    type Info = TileInfo;

    fn build(config: &Self::Config, seed: u64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            board: Board::empty(),
            score: 0.0,
            rng: fastrand::Rng::with_seed(seed),
        })
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.board = Board::empty();
        self.score = 0.0;
        self.board.spawn(&mut self.rng);
        self.board.spawn(&mut self.rng);
        Ok(self.obs())
    }

    fn step(&mut self, act: &Self::Act) -> Step<Self> {
        let reward = match self.board.slide(*act) {
            Some(gained) => {
                self.score += gained as f32;
                self.board.spawn(&mut self.rng);
                gained as f32
            }
            // Rejected move: the board is unchanged and no tile spawns.
            None => -self.config.invalid_move_penalty,
        };
        let done = !self.board.has_moves();
        Step::new(*act, self.obs(), reward, done, self.info())
    }

    fn render(&self) {
        println!("score: {}", self.score);
        println!("{}", self.board);
    }

    fn peak_tile_rank(&self) -> usize {
        self.board.max_rank()
    }
}
