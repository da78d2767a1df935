//! Command line front end: train and evaluate a DQN agent on the
//! tile-merging puzzle.
use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use merge2048_agent::{Dqn, DqnConfig, ExtractorKind, HyperparameterSet};
use merge2048_core::{
    record::{NullRecorder, Recorder},
    Env, Evaluator, ModelStore, Trainer, TrainerConfig,
};
use merge2048_env::{TileEnv, TileEnvConfig};
use merge2048_tensorboard::TensorboardRecorder;

/// The only environment this binary knows how to build.
const ENV_ID: &str = "Merge2048-v0";
/// Hyperparameter section used from the hyperparameter file.
const ALGO: &str = "dqn";
/// Model identifier forced by demo mode.
const DEMO_MODEL_NAME: &str = "dqn-demo";
/// Seed forced by demo mode, so the demo episode is reproducible.
const DEMO_SEED: u64 = 8;

#[derive(Parser, Debug)]
#[command(name = "merge2048", version, about)]
struct Args {
    /// Environment identifier.
    #[arg(long, default_value = ENV_ID)]
    env: String,

    /// Directory for tensorboard event files; tensorboard logging is off
    /// when absent.
    #[arg(long)]
    tensorboard_log: Option<String>,

    /// YAML file with one hyperparameter section per algorithm.
    #[arg(long, default_value = "hyperparams/dqn.yaml")]
    hyperparams_file: String,

    /// Name under which the model is saved and resumed. With an empty name
    /// nothing is persisted.
    #[arg(long, default_value = "")]
    model_name: String,

    /// Timestep budget of the training run.
    #[arg(short = 'n', long, default_value_t = 10_000_000)]
    n_timesteps: usize,

    /// Steps between episode-statistics log lines.
    #[arg(long, default_value_t = 10_000)]
    log_interval: usize,

    /// Steps between in-training evaluation snapshots; non-positive
    /// disables them.
    #[arg(long, default_value_t = 100_000)]
    hist_freq: i64,

    /// Episodes per evaluation.
    #[arg(long, default_value_t = 100)]
    eval_episodes: usize,

    /// Steps between checkpoints; non-positive disables them.
    #[arg(long, default_value_t = 100_000)]
    save_freq: i64,

    /// Directory of model artifacts.
    #[arg(long, default_value = "models")]
    save_directory: String,

    /// Directory of progress dumps.
    #[arg(long, default_value = "logs")]
    log_directory: String,

    /// Seed of the environments and the agent.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log verbosity: 0 warnings only, 1 info, 2 debug.
    #[arg(long, default_value_t = 1)]
    verbose: u8,

    /// Feed raw tile exponents to the agent instead of one-hot planes.
    #[arg(long)]
    no_one_hot: bool,

    /// Run training.
    #[arg(long)]
    train: bool,

    /// Run an evaluation after training.
    #[arg(long)]
    eval: bool,

    /// Override the feature extractor of a newly created model
    /// (flat or cnn).
    #[arg(long)]
    extractor: Option<String>,

    /// Render one evaluation episode of the bundled demo model.
    #[arg(long)]
    demo: bool,
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn env_config(args: &Args) -> TileEnvConfig {
    TileEnvConfig::default().one_hot(!args.no_one_hot)
}

fn agent_config(args: &Args) -> Result<DqnConfig> {
    let (policy, learn) = HyperparameterSet::load(&args.hyperparams_file, ALGO)?.split()?;
    let mut config = DqnConfig { policy, learn };
    if let Some(name) = &args.extractor {
        config = config.extractor(ExtractorKind::parse(name)?);
    }
    Ok(config)
}

fn train(args: &Args, agent: &mut Dqn<TileEnv>, store: &ModelStore) -> Result<()> {
    let config = TrainerConfig::default()
        .n_timesteps(args.n_timesteps)
        .log_interval(args.log_interval)
        .save_freq(args.save_freq)
        .hist_freq(args.hist_freq)
        .eval_episodes(args.eval_episodes)
        .model_name(&args.model_name)
        .log_dir(&args.log_directory)
        .seed(args.seed);
    let trainer = Trainer::build(config);

    let stop = trainer.stop_signal();
    ctrlc::set_handler(move || stop.stop())?;

    let recorder: Box<dyn Recorder> = match &args.tensorboard_log {
        Some(dir) => Box::new(TensorboardRecorder::new(dir)),
        None => Box::new(NullRecorder {}),
    };
    trainer.train::<TileEnv, _>(agent, store, recorder, &env_config(args))
}

fn evaluate(args: &Args, agent: &Dqn<TileEnv>) -> Result<()> {
    let mut evaluator =
        Evaluator::<TileEnv>::build(&env_config(args), args.seed, args.eval_episodes, args.demo)?;
    let report = evaluator.evaluate(agent)?;
    Evaluator::<TileEnv>::log_report(&report);
    Ok(())
}

fn main() -> Result<()> {
    let mut args = Args::parse();
    init_logger(args.verbose);

    if args.env != ENV_ID {
        bail!("unknown environment {:?}, expected {:?}", args.env, ENV_ID);
    }
    if args.demo {
        args.model_name = DEMO_MODEL_NAME.to_string();
        args.train = false;
        args.eval = true;
        args.eval_episodes = 1;
        args.seed = DEMO_SEED;
    }
    fastrand::seed(args.seed);

    let store = ModelStore::new(&args.save_directory)?;
    let config = agent_config(&args)?;
    let mut agent = store.get_or_create(
        &args.model_name,
        || {
            let env = TileEnv::build(&env_config(&args), args.seed)?;
            Dqn::build(config.clone(), env, args.seed)
        },
        |path| {
            let env = TileEnv::build(&env_config(&args), args.seed)?;
            Dqn::from_artifact(path, env, args.seed)
        },
    )?;

    if args.train {
        train(&args, &mut agent, &store)?;
    }
    if args.eval {
        evaluate(&args, &agent)?;
    }
    if !args.train && !args.eval {
        info!("Nothing to do; pass --train and/or --eval.");
    }

    Ok(())
}
