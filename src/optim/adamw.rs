//! AdamW optimizer (Adam with decoupled Weight decay)

use super::{for_each_param, Optimizer};
use crate::params::ModelParams;
use crate::Result;
use ndarray::Array1;
use std::collections::BTreeMap;

/// AdamW optimizer
///
/// Decouples weight decay from the gradient-based update: instead of folding
/// the decay into the gradient, it shrinks the parameters directly.
///
/// θ_t = (1 - lr·λ) θ_{t-1} - lr_t · m_t / (√v_t + ε)
pub struct AdamW {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    t: u64,
    moments: BTreeMap<String, (Array1<f32>, Array1<f32>)>,
}

impl AdamW {
    /// Create a new AdamW optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self { lr, beta1, beta2, epsilon, weight_decay, t: 0, moments: BTreeMap::new() }
    }

    /// Create AdamW with default parameters (weight_decay = 0.01)
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8, 0.01)
    }

    /// Weight decay hyperparameter
    #[must_use]
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }
}

impl Optimizer for AdamW {
    fn step(&mut self, params: &mut ModelParams, grads: &ModelParams) -> Result<()> {
        self.t += 1;
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));
        let decay_factor = 1.0 - self.lr * self.weight_decay;
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let moments = &mut self.moments;

        for_each_param(params, grads, |name, values, grad| {
            let (m, v) = moments
                .entry(name)
                .or_insert_with(|| (Array1::zeros(grad.len()), Array1::zeros(grad.len())));

            *m = &*m * beta1 + &(grad * (1.0 - beta1));
            *v = &*v * beta2 + &(grad.mapv(|g| g * g) * (1.0 - beta2));

            let update = &*m / &(v.mapv(f32::sqrt) + epsilon) * lr_t;
            *values = &*values * decay_factor - &update;
        })
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamTree;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    fn single(value: f32) -> ModelParams {
        let mut decoder = ParamTree::new();
        decoder.insert("w", arr1(&[value]));
        ModelParams::new(ParamTree::new(), decoder)
    }

    #[test]
    fn test_adamw_zero_gradient_applies_only_decay() {
        let mut params = single(1.0);
        let mut optimizer = AdamW::new(0.1, 0.9, 0.999, 1e-8, 0.1);
        let grads = params.zeros_like();

        optimizer.step(&mut params, &grads).unwrap();

        // θ = (1 - lr·λ)·θ = 0.99.
        assert_abs_diff_eq!(params.decoder.get("w").unwrap()[0], 0.99, epsilon = 1e-6);
    }

    #[test]
    fn test_adamw_zero_decay_matches_adam() {
        let mut params_w = single(2.0);
        let mut params_a = single(2.0);
        let mut adamw = AdamW::new(0.05, 0.9, 0.999, 1e-8, 0.0);
        let mut adam = super::super::Adam::default_params(0.05);

        for _ in 0..5 {
            let mut grads = params_w.zeros_like();
            grads.decoder.insert("w", arr1(&[1.0]));
            adamw.step(&mut params_w, &grads).unwrap();
            adam.step(&mut params_a, &grads).unwrap();
        }

        assert_abs_diff_eq!(
            params_w.decoder.get("w").unwrap()[0],
            params_a.decoder.get("w").unwrap()[0],
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_adamw_decay_shrinks_versus_adam() {
        let mut params_w = single(2.0);
        let mut params_a = single(2.0);
        let mut adamw = AdamW::new(0.1, 0.9, 0.999, 1e-8, 0.1);
        let mut adam = super::super::Adam::default_params(0.1);

        for _ in 0..10 {
            let mut grads = params_w.zeros_like();
            grads.decoder.insert("w", arr1(&[1.0]));
            adamw.step(&mut params_w, &grads).unwrap();
            adam.step(&mut params_a, &grads).unwrap();
        }

        assert!(
            params_w.decoder.get("w").unwrap()[0].abs()
                < params_a.decoder.get("w").unwrap()[0].abs()
        );
    }

    #[test]
    fn test_adamw_update_stays_finite_with_extreme_values() {
        let mut params = single(1e6);
        let mut optimizer = AdamW::default_params(0.001);
        let mut grads = params.zeros_like();
        grads.decoder.insert("w", arr1(&[2e6]));

        optimizer.step(&mut params, &grads).unwrap();

        assert!(params.decoder.get("w").unwrap()[0].is_finite());
    }
}
