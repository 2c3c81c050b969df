//! Optimizers and learning-rate schedules
//!
//! Provides the gradient-based update rules selectable from the configuration
//! surface:
//! - `Adam` - bias-corrected adaptive moments
//! - `AdamW` - Adam with decoupled weight decay
//! - `Adafactor` - memory-lean factored second-moment rule
//!
//! and the two schedule families:
//! - `PiecewiseConstantLR` - epoch-milestone multipliers on the base rate
//! - `CosineDecayLR` - smooth decay to a floor fraction of the initial rate
//!
//! The base rule and the schedule compose orthogonally: the trainer resolves
//! the schedule's rate for the current step and feeds it to the rule through
//! `set_lr` before each update.

mod adafactor;
mod adam;
mod adamw;
mod scheduler;

pub use adafactor::Adafactor;
pub use adam::Adam;
pub use adamw::AdamW;
pub use scheduler::{CosineDecayLR, PiecewiseConstantLR, Schedule};

use crate::params::ModelParams;
use crate::{Error, Result};
use std::str::FromStr;

/// Trait for optimization algorithms over the encoder/decoder parameter pair
pub trait Optimizer {
    /// Apply one update step.
    ///
    /// The gradient tree must match the parameter tree's structure exactly; a
    /// disagreement after initialization is a fatal configuration error and is
    /// reported as [`Error::ShapeMismatch`].
    fn step(&mut self, params: &mut ModelParams, grads: &ModelParams) -> Result<()>;

    /// Get the current learning rate
    fn lr(&self) -> f32;

    /// Set the learning rate (driven by the schedule each step)
    fn set_lr(&mut self, lr: f32);
}

/// Walk parameter and gradient buffers in lockstep after validating that the
/// two trees agree structurally. Buffer names arrive prefixed with their
/// sub-tree (`encoder.` / `decoder.`) so per-parameter optimizer state stays
/// unambiguous.
pub(crate) fn for_each_param<F>(
    params: &mut ModelParams,
    grads: &ModelParams,
    mut f: F,
) -> Result<()>
where
    F: FnMut(String, &mut ndarray::Array1<f32>, &ndarray::Array1<f32>),
{
    params.check_same_structure(grads, "optimizer step")?;
    let pairs = [
        ("encoder", &mut params.encoder, &grads.encoder),
        ("decoder", &mut params.decoder, &grads.decoder),
    ];
    for (prefix, tree, grad_tree) in pairs {
        for ((name, values), (_, grad)) in tree.iter_mut().zip(grad_tree.iter()) {
            f(format!("{prefix}.{name}"), values, grad);
        }
    }
    Ok(())
}

/// Closed set of optimizer families on the configuration surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizerKind {
    /// Bias-corrected adaptive moments
    Adam,
    /// Adam with decoupled weight decay
    AdamW,
    /// Factored second-moment rule
    Adafactor,
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "adam" => Ok(OptimizerKind::Adam),
            "adamw" => Ok(OptimizerKind::AdamW),
            "adafactor" => Ok(OptimizerKind::Adafactor),
            other => Err(Error::Config(format!(
                "unknown optimizer '{other}', expected one of adam, adamw, adafactor"
            ))),
        }
    }
}

impl OptimizerKind {
    /// Construct the rule with its default hyperparameters at `lr`
    pub fn build(&self, lr: f32) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Adam => Box::new(Adam::default_params(lr)),
            OptimizerKind::AdamW => Box::new(AdamW::default_params(lr)),
            OptimizerKind::Adafactor => Box::new(Adafactor::new(lr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_kind_parsing() {
        assert_eq!(OptimizerKind::from_str("adam").unwrap(), OptimizerKind::Adam);
        assert_eq!(OptimizerKind::from_str("adamw").unwrap(), OptimizerKind::AdamW);
        assert_eq!(OptimizerKind::from_str("adafactor").unwrap(), OptimizerKind::Adafactor);
    }

    #[test]
    fn test_unknown_optimizer_is_config_error() {
        let err = OptimizerKind::from_str("lion").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_build_applies_learning_rate() {
        for kind in [OptimizerKind::Adam, OptimizerKind::AdamW, OptimizerKind::Adafactor] {
            assert_eq!(kind.build(0.01).lr(), 0.01);
        }
    }
}
