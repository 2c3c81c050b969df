//! Architecture seam
//!
//! Encoder/decoder networks are external collaborators. The trainer and the
//! ELBO objective only see the [`Autoencoder`] trait: shape-probed parameter
//! initialization, an encode step producing a diagonal-Gaussian posterior over
//! the latent grid, a decode step, and the two vector-Jacobian products that
//! let the objective push its analytic gradients through the networks.
//!
//! [`LinearAutoencoder`] is the built-in reference implementation used by the
//! demo binary and the integration tests.

mod activation;
mod linear;

pub use activation::Activation;
pub use linear::LinearAutoencoder;

use crate::data::Batch;
use crate::params::{ModelParams, ParamTree};
use crate::rng::PrngKey;
use crate::Result;
use ndarray::{Array1, Array3, Axis};
use rand::Rng;
use rand_distr::StandardNormal;

/// Diagonal-Gaussian posterior over a spatial latent grid
///
/// Both fields are `(batch, stamp, stamp)`.
#[derive(Clone, Debug)]
pub struct DiagGaussian {
    /// Posterior mean per latent site
    pub mean: Array3<f32>,
    /// Posterior log standard deviation per latent site
    pub log_std: Array3<f32>,
}

impl DiagGaussian {
    /// Reparameterized sample: `z = mean + exp(log_std) * eps`.
    ///
    /// Returns the sample and the raw noise, which the objective needs to
    /// propagate gradients back into `log_std`.
    pub fn sample(&self, key: &PrngKey) -> (Array3<f32>, Array3<f32>) {
        let mut rng = key.rng();
        let eps: Array3<f32> =
            Array3::from_shape_simple_fn(self.mean.dim(), || rng.sample(StandardNormal));
        let z = &self.mean + &(self.log_std.mapv(f32::exp) * &eps);
        (z, eps)
    }

    /// Analytic KL divergence to the zero-mean unit prior, one value per
    /// example: `0.5 Σ (σ² + μ² − 1 − 2 log σ)`
    pub fn kl_to_unit_prior(&self) -> Array1<f32> {
        Array1::from_iter(
            self.mean
                .axis_iter(Axis(0))
                .zip(self.log_std.axis_iter(Axis(0)))
                .map(|(mean, log_std)| {
                    mean.iter()
                        .zip(log_std.iter())
                        .map(|(&m, &ls)| {
                            let var = (2.0 * ls).exp();
                            0.5 * (var + m * m - 1.0 - 2.0 * ls)
                        })
                        .sum()
                }),
        )
    }
}

/// Encoder/decoder pair behind an opaque, differentiable seam
pub trait Autoencoder {
    /// Build both parameter sub-trees from a fixed-shape probe batch
    fn init(&self, key: &PrngKey, probe: &Batch) -> Result<ModelParams>;

    /// Encode observed images into the latent posterior
    fn encode(&self, encoder: &ParamTree, images: &Array3<f32>) -> Result<DiagGaussian>;

    /// Decode a latent sample back to image space
    fn decode(&self, decoder: &ParamTree, latent: &Array3<f32>) -> Result<Array3<f32>>;

    /// Pull upstream gradients on the posterior back to encoder parameters
    fn encode_vjp(
        &self,
        encoder: &ParamTree,
        images: &Array3<f32>,
        grad_mean: &Array3<f32>,
        grad_log_std: &Array3<f32>,
    ) -> Result<ParamTree>;

    /// Pull an upstream gradient on the decoded image back to decoder
    /// parameters and to the latent sample
    fn decode_vjp(
        &self,
        decoder: &ParamTree,
        latent: &Array3<f32>,
        grad_output: &Array3<f32>,
    ) -> Result<(ParamTree, Array3<f32>)>;
}
