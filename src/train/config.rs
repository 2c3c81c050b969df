//! Training configuration
//!
//! [`TrainConfig`] is the stringly-typed surface consumed from the CLI or a
//! config file. [`TrainConfig::resolve`] converts it into closed enums and a
//! concrete schedule exactly once; every unknown tag or invalid value is a
//! [`Error::Config`] here, before any training step runs.

use crate::arch::Activation;
use crate::likelihood::NoiseMode;
use crate::optim::{CosineDecayLR, OptimizerKind, PiecewiseConstantLR, Schedule};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How many evaluation passes a full run aims for; the cadence in steps is
/// `total_steps / EVAL_PASSES`, rounded down.
pub const EVAL_PASSES: usize = 50;

/// User-facing training configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Run identity used by the checkpoint registry and the metric sink
    pub run_id: String,
    /// Name of the suite of simulations to learn from; consumed by the
    /// dataset collaborator and recorded with the run
    pub dataset: String,
    /// Examples per batch
    pub batch_size: usize,
    /// Base learning rate
    pub learning_rate: f32,
    /// Number of training steps
    pub total_steps: usize,
    /// KL regularization coefficient; zero disables the KL term exactly
    pub reg_coeff: f32,
    /// Activation function name (e.g. "gelu")
    pub activation: String,
    /// Optimizer family name (e.g. "adafactor")
    pub optimizer: String,
    /// Noise mode name ("Pixel" or "Fourier")
    pub noise_mode: String,
    /// Schedule family name ("cosine" or "piecewise")
    pub schedule: String,
    /// Cosine floor fraction in [0, 1]
    pub alpha: f32,
    /// Cosine decay horizon in steps
    pub schedule_horizon: usize,
    /// Best-checkpoint activation threshold: persist only when the running
    /// best loss falls under this value
    pub checkpoint_threshold: f32,
    /// Root directory of the checkpoint registry
    pub checkpoint_dir: PathBuf,
    /// Root random seed
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            run_id: "galaxy-vae".to_string(),
            dataset: "Cosmos/25.2".to_string(),
            batch_size: 16,
            learning_rate: 5e-2,
            total_steps: 18_000,
            reg_coeff: 1e-6,
            activation: "gelu".to_string(),
            optimizer: "adafactor".to_string(),
            noise_mode: "Pixel".to_string(),
            schedule: "cosine".to_string(),
            alpha: 1e-4,
            schedule_horizon: 18_000,
            checkpoint_threshold: 1.0,
            checkpoint_dir: PathBuf::from("checkpoints"),
            seed: 42,
        }
    }
}

impl TrainConfig {
    /// Set the step count (builder style)
    pub fn with_total_steps(mut self, total_steps: usize) -> Self {
        self.total_steps = total_steps;
        self
    }

    /// Set the noise mode name (builder style)
    pub fn with_noise_mode(mut self, noise_mode: impl Into<String>) -> Self {
        self.noise_mode = noise_mode.into();
        self
    }

    /// Set the checkpoint registry root (builder style)
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// Resolve the stringly surface into concrete strategies, rejecting
    /// unknown tags and invalid values
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".to_string()));
        }
        if self.total_steps == 0 {
            return Err(Error::Config("total_steps must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.reg_coeff < 0.0 {
            return Err(Error::Config(format!(
                "reg_coeff must be non-negative, got {}",
                self.reg_coeff
            )));
        }

        let activation: Activation = self.activation.parse()?;
        let optimizer: OptimizerKind = self.optimizer.parse()?;
        let noise_mode: NoiseMode = self.noise_mode.parse()?;

        let schedule = match self.schedule.as_str() {
            "cosine" => Schedule::Cosine(CosineDecayLR::new(
                self.learning_rate,
                self.schedule_horizon,
                self.alpha,
            )?),
            "piecewise" => Schedule::Piecewise(PiecewiseConstantLR::reference_milestones()),
            other => {
                return Err(Error::Config(format!(
                    "unknown schedule '{other}', expected 'cosine' or 'piecewise'"
                )))
            }
        };

        // Integer division; small runs get a zero cadence, which disables
        // evaluation rather than rounding up.
        let eval_cadence = self.total_steps / EVAL_PASSES;

        Ok(ResolvedConfig { activation, optimizer, noise_mode, schedule, eval_cadence })
    }
}

/// Concrete strategies resolved from a [`TrainConfig`]
#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    /// Architecture activation
    pub activation: Activation,
    /// Optimizer family
    pub optimizer: OptimizerKind,
    /// Noise likelihood mode
    pub noise_mode: NoiseMode,
    /// Learning-rate schedule
    pub schedule: Schedule,
    /// Steps between evaluation passes; zero disables evaluation
    pub eval_cadence: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_resolves() {
        let resolved = TrainConfig::default().resolve().unwrap();
        assert_eq!(resolved.noise_mode, NoiseMode::Pixel);
        assert_eq!(resolved.optimizer, OptimizerKind::Adafactor);
        assert_eq!(resolved.eval_cadence, 18_000 / 50);
    }

    #[test]
    fn test_unknown_noise_mode_rejected_at_setup() {
        let config = TrainConfig::default().with_noise_mode("Wavelet");
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_optimizer_rejected() {
        let mut config = TrainConfig::default();
        config.optimizer = "sgdm".to_string();
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_unknown_activation_rejected() {
        let mut config = TrainConfig::default();
        config.activation = "swoosh".to_string();
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_unknown_schedule_rejected() {
        let mut config = TrainConfig::default();
        config.schedule = "exponential".to_string();
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_small_run_disables_evaluation() {
        // total_steps under EVAL_PASSES floors the cadence to zero; a
        // degenerate but valid configuration.
        let config = TrainConfig::default().with_total_steps(20);
        assert_eq!(config.resolve().unwrap().eval_cadence, 0);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = TrainConfig::default();
        config.batch_size = 0;
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = TrainConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, config.run_id);
        assert_eq!(back.total_steps, config.total_steps);
    }
}
