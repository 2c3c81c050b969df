//! Learning rate schedules
//!
//! Two deterministic families, both pure functions of the global step:
//! - `PiecewiseConstantLR` - epoch-milestone multipliers applied on top of the
//!   base rule's rate
//! - `CosineDecayLR` - smooth decay from the initial rate to a floor fraction
//!
//! [`Schedule`] resolves the configured family once and answers the absolute
//! rate for a step, which the trainer feeds into the optimizer.

use crate::{Error, Result};
use std::f32::consts::PI;

/// Epoch-milestone multiplier schedule
///
/// The multiplier is 1.0 before the first boundary and drops to the next table
/// value as each boundary epoch is passed. Boundaries are expressed in epochs
/// and compared against `step / steps_per_epoch`.
#[derive(Clone, Debug)]
pub struct PiecewiseConstantLR {
    boundary_steps: Vec<usize>,
    values: Vec<f32>,
}

impl PiecewiseConstantLR {
    /// Create from epoch boundaries and multiplier values.
    ///
    /// `values` must hold exactly one more entry than `boundaries`, start at
    /// 1.0, and be non-increasing.
    pub fn new(boundaries: &[usize], values: &[f32], steps_per_epoch: usize) -> Result<Self> {
        if values.len() != boundaries.len() + 1 {
            return Err(Error::Config(format!(
                "piecewise schedule needs {} values for {} boundaries, got {}",
                boundaries.len() + 1,
                boundaries.len(),
                values.len()
            )));
        }
        if steps_per_epoch == 0 {
            return Err(Error::Config("piecewise schedule needs steps_per_epoch > 0".into()));
        }
        if values.first().copied() != Some(1.0) {
            return Err(Error::Config("piecewise multipliers must start at 1.0".into()));
        }
        if values.windows(2).any(|w| w[1] > w[0]) {
            return Err(Error::Config("piecewise multipliers must be non-increasing".into()));
        }
        if boundaries.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Config("piecewise boundaries must be strictly increasing".into()));
        }
        Ok(Self {
            boundary_steps: boundaries.iter().map(|b| b * steps_per_epoch).collect(),
            values: values.to_vec(),
        })
    }

    /// Milestone table from the reference run: boundaries at epochs 40/100/160
    /// with multipliers 1.0/0.1/0.01/0.001 and 12000/28 steps per epoch.
    pub fn reference_milestones() -> Self {
        Self::new(&[40, 100, 160], &[1.0, 0.1, 0.01, 0.001], 12000 / 28)
            .expect("reference table is well-formed")
    }

    /// Multiplier for the given global step
    pub fn multiplier(&self, step: usize) -> f32 {
        let index = self.boundary_steps.iter().filter(|&&b| b < step).count();
        self.values[index]
    }
}

/// Cosine decay schedule to a floor fraction of the initial rate
#[derive(Clone, Debug)]
pub struct CosineDecayLR {
    init_lr: f32,
    total_steps: usize,
    alpha: f32,
}

impl CosineDecayLR {
    /// Create from the initial rate, the decay horizon, and the floor
    /// fraction `alpha` in `[0, 1]`
    pub fn new(init_lr: f32, total_steps: usize, alpha: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::Config(format!("cosine floor fraction {alpha} outside [0, 1]")));
        }
        Ok(Self { init_lr, total_steps, alpha })
    }

    /// Absolute rate for the given global step; clamps at `alpha * init_lr`
    /// beyond the horizon
    pub fn rate(&self, step: usize) -> f32 {
        if self.total_steps == 0 || step >= self.total_steps {
            return self.alpha * self.init_lr;
        }
        let progress = step as f32 / self.total_steps as f32;
        let decayed = (1.0 - self.alpha) * 0.5 * (1.0 + (PI * progress).cos()) + self.alpha;
        self.init_lr * decayed
    }
}

/// Resolved schedule family
#[derive(Clone, Debug)]
pub enum Schedule {
    /// Multiplier table scaling the base rate
    Piecewise(PiecewiseConstantLR),
    /// Rate fed directly into the base rule
    Cosine(CosineDecayLR),
}

impl Schedule {
    /// Absolute learning rate for a step given the configured base rate
    pub fn rate(&self, step: usize, base_lr: f32) -> f32 {
        match self {
            Schedule::Piecewise(schedule) => base_lr * schedule.multiplier(step),
            Schedule::Cosine(schedule) => schedule.rate(step),
        }
    }
}
