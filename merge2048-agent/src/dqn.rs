//! The DQN agent.
use crate::{config::DqnConfig, nn::QNetwork, replay::ReplayBuffer};
use anyhow::{ensure, Context, Result};
use log::info;
use merge2048_core::{
    error::HarnessError,
    record::{Record, RecordValue},
    Act, Agent, Env, Obs, Policy, StopSignal, TrainCallback,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// The persisted form of the agent: its configuration and the learned
/// network. The replay buffer and the target network are reconstructed on
/// restore.
#[derive(Serialize, Deserialize)]
struct SavedModel {
    config: DqnConfig,
    qnet: QNetwork,
}

/// A deep Q-learning agent with a dueling double-Q update and prioritized
/// replay.
///
/// The agent owns the environment it trains against. Action selection
/// through [`Policy::predict`] is always greedy; epsilon-greedy exploration
/// only happens inside [`Agent::learn`].
pub struct Dqn<E: Env> {
    config: DqnConfig,
    qnet: QNetwork,
    target: QNetwork,
    buffer: ReplayBuffer,
    env: E,
    seed: u64,
    n_opts: usize,
}

impl<E: Env> Dqn<E> {
    /// Builds a fresh agent on the given environment.
    pub fn build(config: DqnConfig, mut env: E, seed: u64) -> Result<Self> {
        let obs = env.reset()?;
        let mut rng = fastrand::Rng::with_seed(seed);
        let qnet = QNetwork::new(obs.dim(), E::Act::n_actions(), &config.policy, &mut rng)?;
        let target = qnet.clone();
        let buffer = Self::fresh_buffer(&config, obs.dim(), seed);
        Ok(Self {
            config,
            qnet,
            target,
            buffer,
            env,
            seed,
            n_opts: 0,
        })
    }

    /// Restores a persisted agent and rebinds it to a fresh environment.
    ///
    /// The architecture and learning schedule come from the artifact; any
    /// hyperparameters configured for the create path do not apply here.
    pub fn from_artifact(path: &Path, mut env: E, seed: u64) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open model artifact {:?}", path))?;
        let saved: SavedModel = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("failed to decode model artifact {:?}", path))?;

        let obs = env.reset()?;
        ensure!(
            saved.qnet.in_dim() == obs.dim(),
            "artifact expects {} observation features, environment provides {}",
            saved.qnet.in_dim(),
            obs.dim()
        );
        ensure!(
            saved.qnet.n_actions() == E::Act::n_actions(),
            "artifact expects {} actions, environment provides {}",
            saved.qnet.n_actions(),
            E::Act::n_actions()
        );

        let buffer = Self::fresh_buffer(&saved.config, obs.dim(), seed);
        Ok(Self {
            target: saved.qnet.clone(),
            qnet: saved.qnet,
            config: saved.config,
            buffer,
            env,
            seed,
            n_opts: 0,
        })
    }

    /// The agent's configuration, as built or as restored.
    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    fn fresh_buffer(config: &DqnConfig, obs_dim: usize, seed: u64) -> ReplayBuffer {
        ReplayBuffer::new(
            config.learn.buffer_size,
            obs_dim,
            config.learn.prioritized_replay_alpha,
            config.learn.prioritized_replay_beta0,
            seed,
        )
    }

    /// Exploration rate at `step`, decaying linearly over the first
    /// `exploration_fraction` of the budget.
    fn epsilon(&self, step: usize, total_timesteps: usize) -> f32 {
        let learn = &self.config.learn;
        let final_step = (learn.exploration_fraction * total_timesteps as f32).max(1.0);
        let frac = (step as f32 / final_step).min(1.0);
        1.0 - frac * (1.0 - learn.exploration_final_eps)
    }

    /// One batched gradient step; returns the mean weighted loss.
    fn optimize(&mut self) -> Result<f32> {
        let learn = &self.config.learn;
        let batch = self.buffer.sample(learn.batch_size);
        let n_actions = self.qnet.n_actions();

        let mut loss_sum = 0.0;
        let mut td_errors = Vec::with_capacity(batch.ixs.len());
        for (&ix, &weight) in batch.ixs.iter().zip(&batch.weights) {
            let (q, cache) = self.qnet.forward_cached(self.buffer.obs(ix));
            let act = self.buffer.act(ix);

            let target = if self.buffer.done(ix) {
                self.buffer.reward(ix)
            } else {
                // Double Q: the online network picks the action, the target
                // network values it.
                let next = self.buffer.next_obs(ix);
                let online = self.qnet.forward(next);
                let best = argmax(&online);
                let value = self.target.forward(next)[best];
                self.buffer.reward(ix) + learn.gamma * value
            };

            let td = q[act] - target;
            td_errors.push(td);
            loss_sum += weight * huber(td);

            let mut dq = vec![0.0; n_actions];
            dq[act] = weight * huber_grad(td);
            self.qnet.backward(&cache, &dq);
        }

        self.qnet
            .apply_grads(learn.learning_rate / learn.batch_size as f32);
        self.buffer.update_priorities(&batch.ixs, &td_errors);
        self.n_opts += 1;
        Ok(loss_sum / batch.ixs.len() as f32)
    }
}

impl<E: Env> Policy<E> for Dqn<E> {
    fn predict(&self, obs: &E::Obs) -> E::Act {
        let q = self.qnet.forward(obs.features());
        E::Act::from_index(argmax(&q))
    }
}

impl<E: Env> Agent<E> for Dqn<E> {
    fn learn(
        &mut self,
        total_timesteps: usize,
        log_interval: usize,
        callbacks: &mut [&mut dyn TrainCallback<E, Self>],
        stop: &StopSignal,
    ) -> Result<usize> {
        let learn = self.config.learn.clone();
        self.buffer
            .set_beta_horizon(total_timesteps / learn.train_freq.max(1));

        let mut obs = self.env.reset()?;
        let mut episode_return = 0.0;
        let mut n_episodes = 0usize;
        let mut recent_returns: Vec<f32> = Vec::new();
        let mut recent_losses: Vec<f32> = Vec::new();

        for step in 1..=total_timesteps {
            if stop.is_stopped() {
                return Err(HarnessError::Interrupted.into());
            }

            let eps = self.epsilon(step, total_timesteps);
            let act = if fastrand::f32() < eps {
                E::Act::sample_uniform()
            } else {
                self.predict(&obs)
            };

            let tr = self.env.step(&act);
            self.buffer.push(
                obs.features(),
                act.index(),
                tr.reward,
                tr.obs.features(),
                tr.done,
            );
            episode_return += tr.reward;
            if tr.done {
                n_episodes += 1;
                recent_returns.push(episode_return);
                episode_return = 0.0;
                obs = self.env.reset()?;
            } else {
                obs = tr.obs;
            }

            if step > learn.learning_starts && step % learn.train_freq.max(1) == 0 {
                recent_losses.push(self.optimize()?);
            }
            if step % learn.target_network_update_freq.max(1) == 0 {
                self.target = self.qnet.clone();
            }

            let record = if step % log_interval == 0 {
                let mut record = Record::from_scalar("eps", eps);
                record.insert("n_episodes", RecordValue::Scalar(n_episodes as f32));
                if !recent_returns.is_empty() {
                    record.insert("episode_reward", RecordValue::Scalar(mean(&recent_returns)));
                }
                if !recent_losses.is_empty() {
                    record.insert("loss", RecordValue::Scalar(mean(&recent_losses)));
                }
                info!(
                    "Step {}: eps {:.3}, episodes {}, mean return {:.1}",
                    step,
                    eps,
                    n_episodes,
                    record.get_scalar("episode_reward").unwrap_or(0.0),
                );
                recent_returns.clear();
                recent_losses.clear();
                record
            } else {
                Record::empty()
            };
            for cb in callbacks.iter_mut() {
                cb.on_step(self, step, &record)?;
            }
        }

        Ok(total_timesteps)
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create model artifact {:?}", path))?;
        let saved = SavedModel {
            config: self.config.clone(),
            qnet: self.qnet.clone(),
        };
        bincode::serialize_into(BufWriter::new(file), &saved)
            .with_context(|| format!("failed to encode model artifact {:?}", path))?;
        info!("Saved model parameters to {:?}", path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)
            .with_context(|| format!("failed to open model artifact {:?}", path))?;
        let saved: SavedModel = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("failed to decode model artifact {:?}", path))?;
        ensure!(
            saved.qnet.in_dim() == self.qnet.in_dim(),
            "artifact expects {} observation features, agent has {}",
            saved.qnet.in_dim(),
            self.qnet.in_dim()
        );
        self.buffer = Self::fresh_buffer(&saved.config, saved.qnet.in_dim(), self.seed);
        self.target = saved.qnet.clone();
        self.qnet = saved.qnet;
        self.config = saved.config;
        self.n_opts = 0;
        Ok(())
    }
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (ix, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = ix;
        }
    }
    best
}

fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len() as f32
}

fn huber(td: f32) -> f32 {
    if td.abs() <= 1.0 {
        0.5 * td * td
    } else {
        td.abs() - 0.5
    }
}

fn huber_grad(td: f32) -> f32 {
    td.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::Dqn;
    use crate::config::{DqnConfig, LearnConfig, PolicyConfig};
    use anyhow::Result;
    use merge2048_core::{
        error::HarnessError, Act as _, Agent as _, Env, ModelStore, Policy as _, StopSignal,
    };
    use merge2048_env::{TileEnv, TileEnvConfig};
    use tempdir::TempDir;

    fn tiny_config() -> DqnConfig {
        DqnConfig {
            policy: PolicyConfig {
                layers: vec![16],
                ..Default::default()
            },
            learn: LearnConfig {
                buffer_size: 256,
                learning_starts: 16,
                batch_size: 8,
                target_network_update_freq: 32,
                ..Default::default()
            },
        }
    }

    fn tiny_agent(seed: u64) -> Result<Dqn<TileEnv>> {
        let env = TileEnv::build(&TileEnvConfig::default().one_hot(false), seed)?;
        Dqn::build(tiny_config(), env, seed)
    }

    #[test]
    fn test_learn_runs_the_full_budget() -> Result<()> {
        let mut agent = tiny_agent(1)?;
        let steps = agent.learn(100, 50, &mut [], &StopSignal::new())?;
        assert_eq!(steps, 100);
        Ok(())
    }

    #[test]
    fn test_raised_stop_signal_interrupts_learning() -> Result<()> {
        let mut agent = tiny_agent(2)?;
        let stop = StopSignal::new();
        stop.stop();
        let err = agent.learn(100, 50, &mut [], &stop).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::Interrupted)
        ));
        Ok(())
    }

    #[test]
    fn test_save_load_round_trip_preserves_predictions() -> Result<()> {
        let dir = TempDir::new("dqn")?;
        let path = dir.path().join("dqn.bin");

        let mut trained = tiny_agent(3)?;
        trained.learn(50, 50, &mut [], &StopSignal::new())?;
        trained.save_params(&path)?;

        let env = TileEnv::build(&TileEnvConfig::default().one_hot(false), 99)?;
        let restored = Dqn::from_artifact(&path, env, 99)?;

        let mut probe = TileEnv::build(&TileEnvConfig::default().one_hot(false), 7)?;
        let obs = probe.reset()?;
        assert_eq!(trained.predict(&obs).index(), restored.predict(&obs).index());
        Ok(())
    }

    #[test]
    fn test_resume_ignores_new_hyperparameters() -> Result<()> {
        let dir = TempDir::new("dqn")?;
        let store = ModelStore::new(dir.path())?;

        let trained = tiny_agent(4)?;
        trained.save_params(&store.model_path("dqn"))?;

        // The create path offers a different architecture; resuming must keep
        // the persisted one.
        let mut other = tiny_config();
        other.policy.layers = vec![64, 64];
        let agent = store.get_or_create(
            "dqn",
            || {
                let env = TileEnv::build(&TileEnvConfig::default().one_hot(false), 5)?;
                Dqn::build(other.clone(), env, 5)
            },
            |path| {
                let env = TileEnv::build(&TileEnvConfig::default().one_hot(false), 5)?;
                Dqn::from_artifact(path, env, 5)
            },
        )?;
        assert_eq!(agent.config().policy.layers, vec![16]);
        Ok(())
    }

    #[test]
    fn test_artifact_dimension_mismatch_is_an_error() -> Result<()> {
        let dir = TempDir::new("dqn")?;
        let path = dir.path().join("dqn.bin");
        let trained = tiny_agent(6)?;
        trained.save_params(&path)?;

        // A one-hot environment has 256 features, the artifact expects 16.
        let env = TileEnv::build(&TileEnvConfig::default(), 6)?;
        assert!(Dqn::from_artifact(&path, env, 6).is_err());
        Ok(())
    }

    #[test]
    fn test_predict_is_deterministic() -> Result<()> {
        let agent = tiny_agent(8)?;
        let mut env = TileEnv::build(&TileEnvConfig::default().one_hot(false), 8)?;
        let obs = env.reset()?;
        assert_eq!(agent.predict(&obs).index(), agent.predict(&obs).index());
        Ok(())
    }
}
