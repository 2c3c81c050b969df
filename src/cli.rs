//! Command-line surface
//!
//! Parses the training flags, assembles the synthetic demo dataset and the
//! linear reference architecture, and drives one full training run. Real
//! deployments swap in their own [`crate::data::Dataset`] and
//! [`crate::arch::Autoencoder`] implementations and keep the same loop.

use crate::arch::LinearAutoencoder;
use crate::data::{synthetic_batches, InMemoryDataset};
use crate::rng::PrngKey;
use crate::train::{JsonlSink, MetricSink, NullSink, TrainConfig, Trainer};
use crate::Result;
use clap::Parser;
use std::path::PathBuf;

/// Train the galaxy VAE on synthetic stamps
#[derive(Parser, Debug)]
#[command(name = "galaxia", version, about)]
pub struct Cli {
    /// Name for the run, used as checkpoint identity
    #[arg(long, default_value = "galaxy-vae")]
    pub name: String,

    /// Suite of simulations to learn from
    #[arg(long, default_value = "Cosmos/25.2")]
    pub dataset: String,

    /// Size of the batch to train on
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// Learning rate for the optimizer
    #[arg(long, default_value_t = 5e-2)]
    pub learning_rate: f32,

    /// Number of training steps to run
    #[arg(long, default_value_t = 18_000)]
    pub training_steps: usize,

    /// Regularization value of the KL divergence
    #[arg(long, default_value_t = 1e-6)]
    pub reg_value: f32,

    /// Activation function, e.g. 'gelu', 'leaky_relu'
    #[arg(long, default_value = "gelu")]
    pub act_fn: String,

    /// Optimizer, e.g. 'adam', 'adamw', 'adafactor'
    #[arg(long, default_value = "adafactor")]
    pub opt: String,

    /// Type of noise: Fourier for correlated, Pixel for white Gaussian
    #[arg(long, default_value = "Pixel")]
    pub noise: String,

    /// Schedule family: 'cosine' or 'piecewise'
    #[arg(long, default_value = "cosine")]
    pub schedule: String,

    /// Coefficient of reduction of the initial learning rate
    #[arg(long, default_value_t = 1e-4)]
    pub alpha: f32,

    /// Steps for the cosine decay horizon
    #[arg(long, default_value_t = 18_000)]
    pub schedule_horizon: usize,

    /// Checkpoint registry root
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Root random seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Side length of the synthetic square stamps
    #[arg(long, default_value_t = 32)]
    pub stamp: usize,

    /// Pixel noise level of the synthetic stamps
    #[arg(long, default_value_t = 0.02)]
    pub noise_level: f32,

    /// Optional JSONL metrics file
    #[arg(long)]
    pub metrics: Option<PathBuf>,
}

impl Cli {
    fn train_config(&self) -> TrainConfig {
        TrainConfig {
            run_id: self.name.clone(),
            dataset: self.dataset.clone(),
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            total_steps: self.training_steps,
            reg_coeff: self.reg_value,
            activation: self.act_fn.clone(),
            optimizer: self.opt.clone(),
            noise_mode: self.noise.clone(),
            schedule: self.schedule.clone(),
            alpha: self.alpha,
            schedule_horizon: self.schedule_horizon,
            checkpoint_dir: self.checkpoint_dir.clone(),
            seed: self.seed,
            ..TrainConfig::default()
        }
    }
}

/// Run one training command to completion
pub fn run_command(cli: Cli) -> Result<()> {
    let config = cli.train_config();
    // Resolve early so bad flags surface before data generation.
    let resolved = config.resolve()?;

    let data_key = PrngKey::from_seed(cli.seed ^ 0x5f5f);
    let train = synthetic_batches(data_key, 64, cli.batch_size, cli.stamp, cli.noise_level)?;
    let eval = synthetic_batches(
        PrngKey::from_seed(cli.seed ^ 0xa0a0),
        8,
        cli.batch_size,
        cli.stamp,
        cli.noise_level,
    )?;
    let dataset = InMemoryDataset::new(train, eval, data_key)?;

    let sink: Box<dyn MetricSink> = match &cli.metrics {
        Some(path) => Box::new(JsonlSink::create(path)?),
        None => Box::new(NullSink),
    };

    let arch = LinearAutoencoder::new(resolved.activation);
    let mut trainer = Trainer::new(arch, dataset, config, sink)?;
    let report = trainer.fit()?;

    println!(
        "Best step: {}, loss trace min at step {}, log-likelihood min at step {}",
        report.checkpoint_step, report.best_step_loss, report.best_step_log_likelihood
    );
    if report.save_failures > 0 {
        println!("Warning: {} checkpoint save(s) failed during the run", report.save_failures);
    }
    Ok(())
}
