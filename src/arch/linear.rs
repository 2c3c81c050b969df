//! Linear reference autoencoder
//!
//! Per-pixel affine encoder and decoder with a scalar weight, bias, and a
//! learned constant posterior log-std. Small enough that every VJP is exact and
//! auditable, yet it exercises the entire training pipeline: probe-shaped
//! initialization, posterior sampling, activation derivatives, and joint
//! encoder/decoder gradients.

use super::{Activation, Autoencoder, DiagGaussian};
use crate::data::Batch;
use crate::params::{ModelParams, ParamTree};
use crate::rng::PrngKey;
use crate::{Error, Result};
use ndarray::{arr1, Array3};
use rand::Rng;
use rand_distr::StandardNormal;

/// Reference architecture: elementwise affine maps around the latent grid
#[derive(Clone, Debug)]
pub struct LinearAutoencoder {
    activation: Activation,
}

impl LinearAutoencoder {
    /// Create with the configured output activation
    pub fn new(activation: Activation) -> Self {
        Self { activation }
    }

    fn scalar(tree: &ParamTree, name: &str) -> Result<f32> {
        let values = tree.require(name)?;
        if values.len() != 1 {
            return Err(Error::shape_mismatch(format!("parameter {name}"), 1usize, values.len()));
        }
        Ok(values[0])
    }
}

impl Autoencoder for LinearAutoencoder {
    fn init(&self, key: &PrngKey, probe: &Batch) -> Result<ModelParams> {
        if probe.is_empty() {
            return Err(Error::DataExhausted("probe batch holds no examples".to_string()));
        }
        let mut rng = key.rng();
        let mut jitter = || 0.1 * rng.sample::<f32, _>(StandardNormal);

        let mut encoder = ParamTree::new();
        encoder.insert("encode.weight", arr1(&[1.0 + jitter()]));
        encoder.insert("encode.bias", arr1(&[jitter() * 0.1]));
        encoder.insert("encode.log_std", arr1(&[-2.0 + jitter()]));

        let mut decoder = ParamTree::new();
        decoder.insert("decode.weight", arr1(&[1.0 + jitter()]));
        decoder.insert("decode.bias", arr1(&[jitter() * 0.1]));

        Ok(ModelParams::new(encoder, decoder))
    }

    fn encode(&self, encoder: &ParamTree, images: &Array3<f32>) -> Result<DiagGaussian> {
        let weight = Self::scalar(encoder, "encode.weight")?;
        let bias = Self::scalar(encoder, "encode.bias")?;
        let log_std = Self::scalar(encoder, "encode.log_std")?;
        Ok(DiagGaussian {
            mean: images.mapv(|x| weight * x + bias),
            log_std: Array3::from_elem(images.dim(), log_std),
        })
    }

    fn decode(&self, decoder: &ParamTree, latent: &Array3<f32>) -> Result<Array3<f32>> {
        let weight = Self::scalar(decoder, "decode.weight")?;
        let bias = Self::scalar(decoder, "decode.bias")?;
        Ok(latent.mapv(|z| self.activation.apply(weight * z + bias)))
    }

    fn encode_vjp(
        &self,
        encoder: &ParamTree,
        images: &Array3<f32>,
        grad_mean: &Array3<f32>,
        grad_log_std: &Array3<f32>,
    ) -> Result<ParamTree> {
        // Touch the tree so structural drift is caught even on the VJP path.
        Self::scalar(encoder, "encode.weight")?;

        let mut grads = ParamTree::new();
        let grad_weight: f32 = grad_mean.iter().zip(images.iter()).map(|(g, x)| g * x).sum();
        grads.insert("encode.weight", arr1(&[grad_weight]));
        grads.insert("encode.bias", arr1(&[grad_mean.sum()]));
        grads.insert("encode.log_std", arr1(&[grad_log_std.sum()]));
        Ok(grads)
    }

    fn decode_vjp(
        &self,
        decoder: &ParamTree,
        latent: &Array3<f32>,
        grad_output: &Array3<f32>,
    ) -> Result<(ParamTree, Array3<f32>)> {
        let weight = Self::scalar(decoder, "decode.weight")?;
        let bias = Self::scalar(decoder, "decode.bias")?;

        // Recompute pre-activations and chain through the activation slope.
        let grad_pre = ndarray::Zip::from(grad_output).and(latent).map_collect(|&g, &z| {
            g * self.activation.derivative(weight * z + bias)
        });

        let mut grads = ParamTree::new();
        let grad_weight: f32 = grad_pre.iter().zip(latent.iter()).map(|(g, z)| g * z).sum();
        grads.insert("decode.weight", arr1(&[grad_weight]));
        grads.insert("decode.bias", arr1(&[grad_pre.sum()]));

        let grad_latent = grad_pre.mapv(|g| g * weight);
        Ok((grads, grad_latent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_batches;
    use approx::assert_abs_diff_eq;

    fn probe() -> Batch {
        synthetic_batches(PrngKey::from_seed(21), 1, 2, 8, 0.02).unwrap().remove(0)
    }

    fn arch() -> LinearAutoencoder {
        LinearAutoencoder::new(Activation::Linear)
    }

    #[test]
    fn test_init_builds_both_subtrees() {
        let params = arch().init(&PrngKey::from_seed(0), &probe()).unwrap();
        assert_eq!(params.encoder.len(), 3);
        assert_eq!(params.decoder.len(), 2);
    }

    #[test]
    fn test_init_is_deterministic() {
        let a = arch().init(&PrngKey::from_seed(0), &probe()).unwrap();
        let b = arch().init(&PrngKey::from_seed(0), &probe()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_decode_shapes_match_input() {
        let batch = probe();
        let params = arch().init(&PrngKey::from_seed(0), &batch).unwrap();
        let posterior = arch().encode(&params.encoder, &batch.image).unwrap();
        assert_eq!(posterior.mean.dim(), batch.image.dim());
        let decoded = arch().decode(&params.decoder, &posterior.mean).unwrap();
        assert_eq!(decoded.dim(), batch.image.dim());
    }

    #[test]
    fn test_encode_missing_parameter_errors() {
        let batch = probe();
        let empty = ParamTree::new();
        assert!(arch().encode(&empty, &batch.image).is_err());
    }

    #[test]
    fn test_decode_vjp_matches_finite_differences() {
        let batch = probe();
        let model = LinearAutoencoder::new(Activation::Tanh);
        let params = model.init(&PrngKey::from_seed(1), &batch).unwrap();
        let latent = batch.image.clone();
        let upstream = Array3::from_elem(latent.dim(), 0.5);

        let (grads, _) = model.decode_vjp(&params.decoder, &latent, &upstream).unwrap();

        let h = 1e-3_f32;
        for name in ["decode.weight", "decode.bias"] {
            let loss_at = |delta: f32| -> f32 {
                let mut perturbed = params.decoder.clone();
                let mut buf = perturbed.get(name).unwrap().clone();
                buf[0] += delta;
                perturbed.insert(name, buf);
                let out = model.decode(&perturbed, &latent).unwrap();
                // Scalar probe loss sum(0.5 * out), whose upstream grad is 0.5.
                out.sum() * 0.5
            };
            let numeric = (loss_at(h) - loss_at(-h)) / (2.0 * h);
            let analytic = grads.get(name).unwrap()[0];
            let tol = 1e-2 * (1.0 + analytic.abs());
            assert!(
                (numeric - analytic).abs() < tol,
                "{name}: numeric {numeric} vs analytic {analytic}"
            );
        }
    }

    #[test]
    fn test_encode_vjp_bias_grad_is_upstream_sum() {
        let batch = probe();
        let params = arch().init(&PrngKey::from_seed(2), &batch).unwrap();
        let ones = Array3::ones(batch.image.dim());
        let zeros = Array3::zeros(batch.image.dim());
        let grads = arch().encode_vjp(&params.encoder, &batch.image, &ones, &zeros).unwrap();
        let count = batch.image.len() as f32;
        assert_abs_diff_eq!(grads.get("encode.bias").unwrap()[0], count, epsilon = 1e-3);
        assert_abs_diff_eq!(grads.get("encode.log_std").unwrap()[0], 0.0, epsilon = 1e-6);
    }
}
