//! Adam optimizer

use super::{for_each_param, Optimizer};
use crate::params::ModelParams;
use crate::Result;
use ndarray::Array1;
use std::collections::BTreeMap;

/// Adam optimizer with bias-corrected first and second moments
///
/// m_t = β1 m_{t-1} + (1-β1) g
/// v_t = β2 v_{t-1} + (1-β2) g²
/// θ_t = θ_{t-1} - lr_t · m_t / (√v_t + ε), with lr_t carrying the
/// √(1-β2^t)/(1-β1^t) bias correction.
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    moments: BTreeMap<String, (Array1<f32>, Array1<f32>)>,
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self { lr, beta1, beta2, epsilon, t: 0, moments: BTreeMap::new() }
    }

    /// Create Adam with default hyperparameters
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    /// Optimizer step counter
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut ModelParams, grads: &ModelParams) -> Result<()> {
        self.t += 1;
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let moments = &mut self.moments;

        for_each_param(params, grads, |name, values, grad| {
            let (m, v) = moments
                .entry(name)
                .or_insert_with(|| (Array1::zeros(grad.len()), Array1::zeros(grad.len())));

            *m = &*m * beta1 + &(grad * (1.0 - beta1));
            *v = &*v * beta2 + &(grad.mapv(|g| g * g) * (1.0 - beta2));

            let update = &*m / &(v.mapv(f32::sqrt) + epsilon) * lr_t;
            *values = &*values - &update;
        })
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
