//! Fixtures used by the unit tests of the harness.
use crate::{
    error::HarnessError, record::Record, Act, Agent, Env, Info, Obs, Policy, Step, StopSignal,
    TrainCallback,
};
use anyhow::Result;
use std::{cell::Cell, path::Path};

#[derive(Clone, Debug)]
pub struct TestObs(pub Vec<f32>);

impl Obs for TestObs {
    fn features(&self) -> &[f32] {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TestAct(pub usize);

impl Act for TestAct {
    fn n_actions() -> usize {
        4
    }

    fn from_index(ix: usize) -> Self {
        Self(ix)
    }

    fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct TestInfo {
    pub score: f32,
}

impl Info for TestInfo {
    fn score(&self) -> f32 {
        self.score
    }
}

/// Configuration of [`ScriptedEnv`].
#[derive(Clone, Debug)]
pub struct ScriptedEnvConfig {
    pub steps_per_episode: usize,
    pub peak_rank: usize,
    pub final_score: f32,
    pub reject_first_step: bool,
}

impl ScriptedEnvConfig {
    pub fn new(steps_per_episode: usize, peak_rank: usize, final_score: f32) -> Self {
        Self {
            steps_per_episode,
            peak_rank,
            final_score,
            reject_first_step: false,
        }
    }

    /// Reports a negative reward on the first step of each episode.
    pub fn reject_first_step(mut self) -> Self {
        self.reject_first_step = true;
        self
    }
}

/// An environment that plays a fixed script: every episode runs a fixed
/// number of steps, ends with a fixed score and a fixed peak tile rank.
pub struct ScriptedEnv {
    config: ScriptedEnvConfig,
    step_in_episode: usize,
    steps_taken: usize,
    rejected_this_episode: bool,
}

impl ScriptedEnv {
    /// Total number of `step` calls since construction.
    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    fn obs(&self) -> TestObs {
        TestObs(vec![self.step_in_episode as f32])
    }
}

impl Env for ScriptedEnv {
    type Config = ScriptedEnvConfig;
    type Obs = TestObs;
    type Act = TestAct;
    type Info = TestInfo;

    fn build(config: &Self::Config, _seed: u64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            step_in_episode: 0,
            steps_taken: 0,
            rejected_this_episode: false,
        })
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.step_in_episode = 0;
        self.rejected_this_episode = false;
        Ok(self.obs())
    }

    fn step(&mut self, act: &Self::Act) -> Step<Self> {
        self.steps_taken += 1;
        if self.config.reject_first_step && self.step_in_episode == 0 && !self.rejected_this_episode
        {
            self.rejected_this_episode = true;
            return Step::new(act.clone(), self.obs(), -1.0, false, TestInfo { score: 0.0 });
        }
        self.step_in_episode += 1;
        let done = self.step_in_episode >= self.config.steps_per_episode;
        let score = if done { self.config.final_score } else { 0.0 };
        Step::new(act.clone(), self.obs(), 1.0, done, TestInfo { score })
    }

    fn render(&self) {}

    fn peak_tile_rank(&self) -> usize {
        self.config.peak_rank
    }
}

/// A policy that always proposes the same action.
pub struct FixedPolicy(TestAct);

impl FixedPolicy {
    pub fn new(ix: usize) -> Self {
        Self(TestAct(ix))
    }
}

impl Policy<ScriptedEnv> for FixedPolicy {
    fn predict(&self, _obs: &TestObs) -> TestAct {
        self.0.clone()
    }
}

/// An agent whose "parameters" are the number of learning steps performed.
///
/// `save_params` writes that number as text, which lets tests check that a
/// persisted artifact reflects the state at the time of the save.
pub struct CountingAgent {
    pub steps_done: usize,
    /// When set, learning pretends to receive a cancellation signal after
    /// this many steps.
    pub interrupt_after: Option<usize>,
    pub saves: Cell<usize>,
}

impl CountingAgent {
    pub fn new() -> Self {
        Self {
            steps_done: 0,
            interrupt_after: None,
            saves: Cell::new(0),
        }
    }
}

impl Policy<ScriptedEnv> for CountingAgent {
    fn predict(&self, _obs: &TestObs) -> TestAct {
        TestAct(0)
    }
}

impl Agent<ScriptedEnv> for CountingAgent {
    fn learn(
        &mut self,
        total_timesteps: usize,
        _log_interval: usize,
        callbacks: &mut [&mut dyn TrainCallback<ScriptedEnv, Self>],
        stop: &StopSignal,
    ) -> Result<usize> {
        for step in 1..=total_timesteps {
            if let Some(n) = self.interrupt_after {
                if step > n {
                    stop.stop();
                }
            }
            if stop.is_stopped() {
                return Err(HarnessError::Interrupted.into());
            }
            self.steps_done = step;
            let record = Record::empty();
            for cb in callbacks.iter_mut() {
                cb.on_step(&*self, step, &record)?;
            }
        }
        Ok(total_timesteps)
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        self.saves.set(self.saves.get() + 1);
        std::fs::write(path, self.steps_done.to_string())?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.steps_done = text.trim().parse()?;
        Ok(())
    }
}
