//! Evaluate a trained policy by repeated episode rollouts.
use crate::{Act, Env, Info, Policy};
use anyhow::Result;
use log::info;
use std::{fmt, thread, time::Duration};

/// The largest tile rank the harness accounts for (tile value 2^14).
pub const MAX_TILE_RANK: usize = 14;

/// Wait inserted between rendered steps in demo mode.
const DEMO_STEP_WAIT: Duration = Duration::from_millis(50);

/// Counts of episodes per peak tile rank reached.
///
/// Index `i` counts the episodes whose largest tile was exactly `2^i`.
/// Index 0 is reserved and never populated by a real game, since the
/// smallest tile is 2^1. Counts are raw, never normalized.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileHistogram([u64; MAX_TILE_RANK + 1]);

impl TileHistogram {
    /// Creates an all-zero histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one episode that peaked at the given tile rank.
    pub fn record(&mut self, rank: usize) {
        debug_assert!(rank <= MAX_TILE_RANK, "tile rank {} out of range", rank);
        self.0[rank.min(MAX_TILE_RANK)] += 1;
    }

    /// The count at the given rank.
    pub fn count(&self, rank: usize) -> u64 {
        self.0[rank]
    }

    /// The raw counters, indexed by tile rank.
    pub fn counts(&self) -> &[u64] {
        &self.0
    }

    /// Total number of episodes recorded.
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Ranks with a non-zero count, in ascending order.
    pub fn nonzero(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(i, &c)| (i, c))
    }
}

impl fmt::Display for TileHistogram {
    /// Lists non-zero counts as `tile value: count`, one per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, count) in self.nonzero() {
            writeln!(f, "{}: {}", 1u64 << rank, count)?;
        }
        Ok(())
    }
}

/// Result of an evaluation run.
#[derive(Clone, Debug)]
pub struct EvalReport {
    /// Arithmetic mean of the terminal episode scores.
    pub mean_score: f32,

    /// Peak-tile-rank histogram over all episodes of the run.
    pub histogram: TileHistogram,
}

/// Runs episode rollouts against a fixed policy and aggregates the outcomes.
///
/// Each episode follows reset -> step* -> done. When the environment reports
/// a negative reward the proposed move is treated as rejected and repaired:
/// a uniformly random action is applied instead, and the repaired step's
/// done flag and info replace those of the rejected step. This keeps an
/// episode progressing when the learned policy proposes an invalid move, at
/// the cost of occasional random play.
pub struct Evaluator<E: Env> {
    env: E,
    n_episodes: usize,
    demo: bool,
}

impl<E: Env> Evaluator<E> {
    /// Builds an evaluator with its own environment instance.
    ///
    /// With `demo` enabled, every step renders the environment and waits
    /// ~50ms so playback is human-observable; outcome accounting is
    /// unaffected.
    pub fn build(config: &E::Config, seed: u64, n_episodes: usize, demo: bool) -> Result<Self> {
        Ok(Self {
            env: E::build(config, seed)?,
            n_episodes,
            demo,
        })
    }

    /// Rolls out the configured number of episodes and reports the mean
    /// terminal score and the peak-tile-rank histogram.
    ///
    /// Collaborator failures are not retried; they abort the run with no
    /// partial result.
    pub fn evaluate<P: Policy<E>>(&mut self, policy: &P) -> Result<EvalReport> {
        let mut scores = Vec::with_capacity(self.n_episodes);
        let mut histogram = TileHistogram::new();

        for _ in 0..self.n_episodes {
            let mut obs = self.env.reset()?;
            loop {
                let act = policy.predict(&obs);
                let mut step = self.env.step(&act);
                if step.reward < 0.0 {
                    // Rejected move: retry with a uniformly random action and
                    // keep the repaired step's outcome.
                    let act = E::Act::sample_uniform();
                    step = self.env.step(&act);
                }
                if self.demo {
                    self.env.render();
                    thread::sleep(DEMO_STEP_WAIT);
                }
                if step.done {
                    histogram.record(self.env.peak_tile_rank());
                    scores.push(step.info.score());
                    break;
                }
                obs = step.obs;
            }
        }

        let mean_score = scores.iter().sum::<f32>() / scores.len() as f32;
        Ok(EvalReport {
            mean_score,
            histogram,
        })
    }

    /// Logs the mean reward and the non-zero histogram entries.
    pub fn log_report(report: &EvalReport) {
        info!("Reward: {}", report.mean_score);
        info!("Histogram of maximum tile achieved:");
        for (rank, count) in report.histogram.nonzero() {
            if rank > 0 {
                info!("{}: {}", 1u64 << rank, count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedPolicy, ScriptedEnv, ScriptedEnvConfig};

    #[test]
    fn test_histogram_counts_sum_to_episodes() {
        // 5 episodes of 3 steps each, peaking at rank 4 with score 48.
        let config = ScriptedEnvConfig::new(3, 4, 48.0);
        let mut evaluator = Evaluator::<ScriptedEnv>::build(&config, 0, 5, false).unwrap();
        let report = evaluator.evaluate(&FixedPolicy::new(0)).unwrap();
        assert_eq!(report.histogram.total(), 5);
        assert_eq!(report.histogram.count(4), 5);
    }

    #[test]
    fn test_mean_score_and_single_rank() {
        let config = ScriptedEnvConfig::new(2, 5, 120.0);
        let mut evaluator = Evaluator::<ScriptedEnv>::build(&config, 0, 3, false).unwrap();
        let report = evaluator.evaluate(&FixedPolicy::new(1)).unwrap();
        assert_eq!(report.mean_score, 120.0);
        assert_eq!(report.histogram.count(5), 3);
        for (rank, _) in report.histogram.nonzero() {
            assert_eq!(rank, 5);
        }
    }

    #[test]
    fn test_no_repair_without_negative_reward() {
        let config = ScriptedEnvConfig::new(4, 3, 16.0);
        let mut evaluator = Evaluator::<ScriptedEnv>::build(&config, 0, 2, false).unwrap();
        let _ = evaluator.evaluate(&FixedPolicy::new(0)).unwrap();
        // One env step per loop iteration: 2 episodes * 4 steps.
        assert_eq!(evaluator.env.steps_taken(), 8);
    }

    #[test]
    fn test_negative_reward_triggers_repair() {
        let config = ScriptedEnvConfig::new(3, 2, 8.0).reject_first_step();
        let mut evaluator = Evaluator::<ScriptedEnv>::build(&config, 0, 1, false).unwrap();
        let report = evaluator.evaluate(&FixedPolicy::new(0)).unwrap();
        // The rejected step is retried, so one extra env step was taken.
        assert_eq!(evaluator.env.steps_taken(), 4);
        assert_eq!(report.histogram.total(), 1);
    }

    #[test]
    fn test_histogram_display_lists_tile_values() {
        let mut hist = TileHistogram::new();
        hist.record(5);
        hist.record(5);
        hist.record(7);
        let s = format!("{}", hist);
        assert_eq!(s, "32: 2\n128: 1\n");
    }

    #[test]
    fn test_index_zero_never_populated_by_rollouts() {
        let config = ScriptedEnvConfig::new(1, 1, 4.0);
        let mut evaluator = Evaluator::<ScriptedEnv>::build(&config, 0, 4, false).unwrap();
        let report = evaluator.evaluate(&FixedPolicy::new(2)).unwrap();
        assert_eq!(report.histogram.count(0), 0);
        assert_eq!(report.histogram.total(), 4);
    }
}
