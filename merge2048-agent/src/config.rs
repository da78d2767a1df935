//! Configuration of the DQN agent.
use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Feature extractor in front of the fully connected layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractorKind {
    /// Feed the flat observation straight into the fully connected layers.
    Flat,
    /// A single 2x2 convolution over the board, one channel per feature
    /// plane.
    Conv,
}

impl ExtractorKind {
    /// Parses an extractor name as given on the command line.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "flat" | "mlp" => Ok(Self::Flat),
            "cnn" => Ok(Self::Conv),
            _ => bail!("unknown extractor {:?}", name),
        }
    }
}

/// Architecture of the Q-network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Widths of the fully connected hidden layers.
    pub layers: Vec<usize>,
    /// Split the head into state-value and advantage streams.
    pub dueling: bool,
    /// Feature extractor in front of the hidden layers.
    pub extractor: ExtractorKind,
    /// Normalize each hidden layer before its activation.
    pub layer_norm: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            layers: vec![64, 64],
            dueling: true,
            extractor: ExtractorKind::Flat,
            layer_norm: false,
        }
    }
}

fn default_learning_rate() -> f32 {
    5e-4
}
fn default_buffer_size() -> usize {
    50_000
}
fn default_learning_starts() -> usize {
    1000
}
fn default_batch_size() -> usize {
    32
}
fn default_train_freq() -> usize {
    1
}
fn default_target_network_update_freq() -> usize {
    500
}
fn default_gamma() -> f32 {
    0.99
}
fn default_exploration_fraction() -> f32 {
    0.1
}
fn default_exploration_final_eps() -> f32 {
    0.02
}
fn default_prioritized_replay_alpha() -> f32 {
    0.6
}
fn default_prioritized_replay_beta0() -> f32 {
    0.4
}

/// Learning schedule of the DQN agent.
///
/// Field names follow the conventional hyperparameter file vocabulary for
/// this algorithm, so a hyperparameter file can override any subset of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnConfig {
    /// Step size of the gradient updates.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    /// Capacity of the replay buffer.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Environment steps collected before the first optimization.
    #[serde(default = "default_learning_starts")]
    pub learning_starts: usize,
    /// Transitions per optimization step.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Environment steps between optimizations.
    #[serde(default = "default_train_freq")]
    pub train_freq: usize,
    /// Environment steps between target network refreshes.
    #[serde(default = "default_target_network_update_freq")]
    pub target_network_update_freq: usize,
    /// Discount factor.
    #[serde(default = "default_gamma")]
    pub gamma: f32,
    /// Fraction of the timestep budget over which exploration decays.
    #[serde(default = "default_exploration_fraction")]
    pub exploration_fraction: f32,
    /// Exploration rate after the decay.
    #[serde(default = "default_exploration_final_eps")]
    pub exploration_final_eps: f32,
    /// Exponent applied to priorities in the replay buffer.
    #[serde(default = "default_prioritized_replay_alpha")]
    pub prioritized_replay_alpha: f32,
    /// Initial exponent of the importance sampling weights.
    #[serde(default = "default_prioritized_replay_beta0")]
    pub prioritized_replay_beta0: f32,
}

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            buffer_size: default_buffer_size(),
            learning_starts: default_learning_starts(),
            batch_size: default_batch_size(),
            train_freq: default_train_freq(),
            target_network_update_freq: default_target_network_update_freq(),
            gamma: default_gamma(),
            exploration_fraction: default_exploration_fraction(),
            exploration_final_eps: default_exploration_final_eps(),
            prioritized_replay_alpha: default_prioritized_replay_alpha(),
            prioritized_replay_beta0: default_prioritized_replay_beta0(),
        }
    }
}

/// Constructs [`Dqn`](crate::Dqn).
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct DqnConfig {
    /// Architecture of the Q-network.
    pub policy: PolicyConfig,
    /// Learning schedule.
    pub learn: LearnConfig,
}

impl DqnConfig {
    /// Overrides the feature extractor.
    pub fn extractor(mut self, kind: ExtractorKind) -> Self {
        self.policy.extractor = kind;
        self
    }

    /// Loads a [`DqnConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open agent config {:?}", path))?;
        let config = serde_yaml::from_reader(BufReader::new(file))?;
        info!("Loaded agent config from {:?}", path);
        Ok(config)
    }

    /// Saves this [`DqnConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::create(path)
            .with_context(|| format!("failed to create agent config {:?}", path))?;
        file.write_all(serde_yaml::to_string(self)?.as_bytes())?;
        info!("Saved agent config to {:?}", path);
        Ok(self.clone())
    }
}

/// A flat hyperparameter mapping as read from a hyperparameter file.
///
/// The mapping mixes architecture keys (`layers`, `dueling`, `cnn`, `ln`)
/// with learning-schedule keys; [`split`](Self::split) separates the two.
/// Keys absent from the mapping keep their defaults.
#[derive(Clone, Debug, Default)]
pub struct HyperparameterSet(Mapping);

impl HyperparameterSet {
    /// Loads the hyperparameter mapping for `key` from a YAML file of the
    /// shape `{key: {name: value, ...}, ...}`.
    pub fn load(path: impl AsRef<Path>, key: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open hyperparameter file {:?}", path))?;
        let mut root: Mapping = serde_yaml::from_reader(BufReader::new(file))?;
        let section = root
            .remove(&Value::String(key.into()))
            .with_context(|| format!("no section {:?} in hyperparameter file {:?}", key, path))?;
        match section {
            Value::Mapping(m) => Ok(Self(m)),
            _ => bail!("section {:?} in {:?} is not a mapping", key, path),
        }
    }

    /// Splits the mapping into the architecture and the learning schedule.
    pub fn split(self) -> Result<(PolicyConfig, LearnConfig)> {
        let mut rest = self.0;
        let mut policy = PolicyConfig::default();

        if let Some(v) = rest.remove(&Value::String("layers".into())) {
            policy.layers = serde_yaml::from_value(v).context("bad value for layers")?;
        }
        if let Some(v) = rest.remove(&Value::String("dueling".into())) {
            policy.dueling = serde_yaml::from_value(v).context("bad value for dueling")?;
        }
        if let Some(v) = rest.remove(&Value::String("cnn".into())) {
            let cnn: bool = serde_yaml::from_value(v).context("bad value for cnn")?;
            policy.extractor = if cnn {
                ExtractorKind::Conv
            } else {
                ExtractorKind::Flat
            };
        }
        if let Some(v) = rest.remove(&Value::String("ln".into())) {
            policy.layer_norm = serde_yaml::from_value(v).context("bad value for ln")?;
        }

        let learn = serde_yaml::from_value(Value::Mapping(rest))
            .context("bad learning hyperparameters")?;
        Ok((policy, learn))
    }
}

#[cfg(test)]
mod tests {
    use super::{DqnConfig, ExtractorKind, HyperparameterSet};
    use anyhow::Result;
    use tempdir::TempDir;

    const HYPERPARAMS: &str = "\
dqn:
  layers: [256, 256]
  dueling: false
  cnn: true
  learning_rate: 0.001
  buffer_size: 10000
";

    #[test]
    fn test_split_separates_architecture_from_schedule() -> Result<()> {
        let dir = TempDir::new("config")?;
        let path = dir.path().join("dqn.yaml");
        std::fs::write(&path, HYPERPARAMS)?;

        let (policy, learn) = HyperparameterSet::load(&path, "dqn")?.split()?;
        assert_eq!(policy.layers, vec![256, 256]);
        assert!(!policy.dueling);
        assert_eq!(policy.extractor, ExtractorKind::Conv);
        assert!(!policy.layer_norm);
        assert_eq!(learn.learning_rate, 0.001);
        assert_eq!(learn.buffer_size, 10000);
        // Untouched keys keep their defaults.
        assert_eq!(learn.batch_size, 32);
        assert_eq!(learn.gamma, 0.99);
        Ok(())
    }

    #[test]
    fn test_missing_section_is_an_error() -> Result<()> {
        let dir = TempDir::new("config")?;
        let path = dir.path().join("dqn.yaml");
        std::fs::write(&path, HYPERPARAMS)?;
        assert!(HyperparameterSet::load(&path, "ppo").is_err());
        Ok(())
    }

    #[test]
    fn test_config_yaml_round_trip() -> Result<()> {
        let dir = TempDir::new("config")?;
        let path = dir.path().join("agent.yaml");
        let config = DqnConfig::default().extractor(ExtractorKind::Conv);
        config.save(&path)?;
        assert_eq!(DqnConfig::load(&path)?, config);
        Ok(())
    }
}
