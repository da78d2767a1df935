//! On-disk layout of model artifacts and resume-vs-create resolution.
use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

/// Extension of persisted artifacts.
const ARTIFACT_EXT: &str = "bin";

/// A directory of persisted agent artifacts.
///
/// The final save of a model named `n` lives at `{save_dir}/n.bin`; periodic
/// checkpoints live at `{save_dir}/{prefix}_{steps}.bin`. Artifacts are never
/// deleted by the harness. Nothing coordinates concurrent writers to the same
/// identifier; avoiding that race is the caller's responsibility.
#[derive(Clone, Debug)]
pub struct ModelStore {
    save_dir: PathBuf,
}

impl ModelStore {
    /// Opens (and creates, if needed) the store directory.
    pub fn new(save_dir: impl Into<PathBuf>) -> Result<Self> {
        let save_dir = save_dir.into();
        std::fs::create_dir_all(&save_dir)
            .with_context(|| format!("failed to create model directory {:?}", save_dir))?;
        Ok(Self { save_dir })
    }

    /// Path of the final artifact for the given model name.
    pub fn model_path(&self, name: &str) -> PathBuf {
        self.save_dir.join(format!("{}.{}", name, ARTIFACT_EXT))
    }

    /// Path of a periodic checkpoint artifact tagged with a step count.
    pub fn checkpoint_path(&self, prefix: &str, steps: usize) -> PathBuf {
        self.save_dir
            .join(format!("{}_{}.{}", prefix, steps, ARTIFACT_EXT))
    }

    /// Whether a final artifact for the given model name exists.
    pub fn contains(&self, name: &str) -> bool {
        !name.is_empty() && self.model_path(name).exists()
    }

    /// Restores the agent persisted under `name` if it exists, and builds a
    /// fresh one otherwise.
    ///
    /// `restore` receives the artifact path; it is expected to rebind the
    /// restored agent to a newly constructed environment and to ignore any
    /// hyperparameters supplied for the create path, since the architecture
    /// is fixed by the artifact. A present-but-unreadable artifact is an
    /// error, not a fallback to creation.
    pub fn get_or_create<A>(
        &self,
        name: &str,
        create: impl FnOnce() -> Result<A>,
        restore: impl FnOnce(&Path) -> Result<A>,
    ) -> Result<A> {
        if self.contains(name) {
            let path = self.model_path(name);
            info!("Resuming model {:?} from {:?}", name, path);
            restore(&path).with_context(|| format!("failed to restore model artifact {:?}", path))
        } else {
            if !name.is_empty() {
                info!("No artifact for model {:?}, creating a new one", name);
            }
            create()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ModelStore;
    use crate::{testing::CountingAgent, Agent as _};
    use anyhow::Result;
    use tempdir::TempDir;

    #[test]
    fn test_artifact_paths() -> Result<()> {
        let dir = TempDir::new("model_store")?;
        let store = ModelStore::new(dir.path())?;
        assert!(store
            .model_path("dqn")
            .to_str()
            .unwrap()
            .ends_with("dqn.bin"));
        assert!(store
            .checkpoint_path("dqn", 1000)
            .to_str()
            .unwrap()
            .ends_with("dqn_1000.bin"));
        Ok(())
    }

    #[test]
    fn test_missing_artifact_falls_through_to_create() -> Result<()> {
        let dir = TempDir::new("model_store")?;
        let store = ModelStore::new(dir.path())?;
        let agent = store.get_or_create(
            "absent",
            || Ok(CountingAgent::new()),
            |_| panic!("restore must not be called"),
        )?;
        assert_eq!(agent.steps_done, 0);
        Ok(())
    }

    #[test]
    fn test_existing_artifact_is_restored() -> Result<()> {
        let dir = TempDir::new("model_store")?;
        let store = ModelStore::new(dir.path())?;

        let mut trained = CountingAgent::new();
        trained.steps_done = 42;
        trained.save_params(&store.model_path("dqn"))?;

        let restored = store.get_or_create(
            "dqn",
            || panic!("create must not be called"),
            |path| {
                let mut agent = CountingAgent::new();
                agent.load_params(path)?;
                Ok(agent)
            },
        )?;
        assert_eq!(restored.steps_done, 42);
        Ok(())
    }

    #[test]
    fn test_empty_name_always_creates() -> Result<()> {
        let dir = TempDir::new("model_store")?;
        let store = ModelStore::new(dir.path())?;
        let agent = store.get_or_create(
            "",
            || Ok(CountingAgent::new()),
            |_| panic!("restore must not be called"),
        )?;
        assert_eq!(agent.steps_done, 0);
        Ok(())
    }

    #[test]
    fn test_corrupt_artifact_is_an_error() -> Result<()> {
        let dir = TempDir::new("model_store")?;
        let store = ModelStore::new(dir.path())?;
        std::fs::write(store.model_path("dqn"), "not a number")?;

        let result = store.get_or_create(
            "dqn",
            || Ok(CountingAgent::new()),
            |path| {
                let mut agent = CountingAgent::new();
                agent.load_params(path)?;
                Ok(agent)
            },
        );
        assert!(result.is_err());
        Ok(())
    }
}
