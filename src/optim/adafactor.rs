//! Adafactor optimizer

use super::{for_each_param, Optimizer};
use crate::params::ModelParams;
use crate::Result;
use ndarray::Array1;
use std::collections::BTreeMap;

const EPSILON1: f32 = 1e-30;
const CLIP_THRESHOLD: f32 = 1.0;

/// Adafactor optimizer
///
/// Second-moment rule with a growing decay rate `β2_t = 1 - t^(-0.8)` and
/// RMS-clipped updates. Matrix parameters would take the factored row/column
/// statistics path; the flat vector buffers this crate carries use the
/// unfactored second moment, which is exact.
pub struct Adafactor {
    lr: f32,
    t: u64,
    v: BTreeMap<String, Array1<f32>>,
}

impl Adafactor {
    /// Create a new Adafactor optimizer
    pub fn new(lr: f32) -> Self {
        Self { lr, t: 0, v: BTreeMap::new() }
    }
}

impl Optimizer for Adafactor {
    fn step(&mut self, params: &mut ModelParams, grads: &ModelParams) -> Result<()> {
        self.t += 1;
        let beta2_t = 1.0 - (self.t as f32).powf(-0.8);
        let lr = self.lr;
        let v_state = &mut self.v;

        for_each_param(params, grads, |name, values, grad| {
            let v = v_state.entry(name).or_insert_with(|| Array1::zeros(grad.len()));

            *v = &*v * beta2_t + &(grad.mapv(|g| g * g + EPSILON1) * (1.0 - beta2_t));

            let mut update = grad / &v.mapv(f32::sqrt);
            let rms = (update.mapv(|u| u * u).mean().unwrap_or(0.0)).sqrt();
            if rms > CLIP_THRESHOLD {
                update.mapv_inplace(|u| u / (rms / CLIP_THRESHOLD));
            }

            *values = &*values - &(update * lr);
        })
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
