//! Batch schema and the dataset seam
//!
//! The trainer only sees the [`Dataset`] trait: an unbounded, reshuffled train
//! stream and a finite held-out split. Storage formats, sharding, and
//! augmentation live behind this boundary. [`InMemoryDataset`] is the reference
//! implementation, and [`synthetic_batches`] produces Gaussian-blob galaxy
//! stamps with a matching Fourier PSF for demos and integration tests.

use crate::fourier::fft2_real;
use crate::rng::PrngKey;
use crate::{Error, Result};
use ndarray::{Array1, Array2, Array3};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;

/// One aligned batch of observations
///
/// All image-shaped fields share the `(batch, stamp, stamp)` shape; stamps are
/// square. `power_spectrum` holds the log noise power per frequency bin, used
/// only by the Fourier likelihood; `noise_std` is the per-example pixel noise
/// level, used only by the pixel likelihood.
#[derive(Clone, Debug)]
pub struct Batch {
    /// Observed images, `(batch, stamp, stamp)`
    pub image: Array3<f32>,
    /// Real part of the Fourier-domain PSF, `(batch, stamp, stamp)`
    pub kpsf_real: Array3<f32>,
    /// Imaginary part of the Fourier-domain PSF, `(batch, stamp, stamp)`
    pub kpsf_imag: Array3<f32>,
    /// Per-example pixel noise standard deviation, `(batch,)`
    pub noise_std: Array1<f32>,
    /// Per-frequency log noise power, `(batch, stamp, stamp)`
    pub power_spectrum: Array3<f32>,
}

impl Batch {
    /// Validate field alignment and build a batch.
    ///
    /// Fails fast with [`Error::ShapeMismatch`] when any field disagrees on the
    /// leading batch dimension or the spatial stamp, or when stamps are not
    /// square.
    pub fn new(
        image: Array3<f32>,
        kpsf_real: Array3<f32>,
        kpsf_imag: Array3<f32>,
        noise_std: Array1<f32>,
        power_spectrum: Array3<f32>,
    ) -> Result<Self> {
        let dim = image.dim();
        let (batch, height, width) = dim;
        if height != width {
            return Err(Error::shape_mismatch("batch stamps", "square stamp", dim));
        }
        for (name, shape) in [
            ("kpsf_real", kpsf_real.dim()),
            ("kpsf_imag", kpsf_imag.dim()),
            ("power_spectrum", power_spectrum.dim()),
        ] {
            if shape != dim {
                return Err(Error::shape_mismatch(format!("batch field {name}"), dim, shape));
            }
        }
        if noise_std.len() != batch {
            return Err(Error::shape_mismatch("batch field noise_std", batch, noise_std.len()));
        }
        Ok(Self { image, kpsf_real, kpsf_imag, noise_std, power_spectrum })
    }

    /// Number of examples in the batch
    pub fn len(&self) -> usize {
        self.image.dim().0
    }

    /// True when the batch holds no examples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Side length of the square stamp
    pub fn stamp_size(&self) -> usize {
        self.image.dim().1
    }
}

/// Stream of batches for a named split
pub trait Dataset {
    /// Next batch from the unbounded train stream. Implementations reshuffle
    /// and restart when the underlying collection is exhausted.
    fn next_train(&mut self) -> Result<Batch>;

    /// The full held-out split, exhaustible once per evaluation cycle
    fn eval_split(&mut self) -> Result<Vec<Batch>>;
}

/// Dataset over pre-materialized batches
pub struct InMemoryDataset {
    train: Vec<Batch>,
    eval: Vec<Batch>,
    order: Vec<usize>,
    cursor: usize,
    key: PrngKey,
}

impl InMemoryDataset {
    /// Build from train and held-out batches; `key` drives reshuffling
    pub fn new(train: Vec<Batch>, eval: Vec<Batch>, key: PrngKey) -> Result<Self> {
        if train.is_empty() {
            return Err(Error::DataExhausted("train split holds no batches".to_string()));
        }
        let order: Vec<usize> = (0..train.len()).collect();
        Ok(Self { train, eval, order, cursor: 0, key })
    }
}

impl Dataset for InMemoryDataset {
    fn next_train(&mut self) -> Result<Batch> {
        if self.cursor == self.order.len() {
            let (next, shuffle_key) = self.key.split();
            self.key = next;
            self.order.shuffle(&mut shuffle_key.rng());
            self.cursor = 0;
        }
        let batch = self.train[self.order[self.cursor]].clone();
        self.cursor += 1;
        Ok(batch)
    }

    fn eval_split(&mut self) -> Result<Vec<Batch>> {
        Ok(self.eval.clone())
    }
}

/// Generate batches of synthetic galaxy stamps.
///
/// Each example is an elliptical Gaussian blob with randomized center, scale,
/// and amplitude, blurred by a circular Gaussian PSF and corrupted with white
/// pixel noise. The PSF ships in Fourier form, and the power spectrum matches
/// the white-noise level, so both likelihood modes are exercisable.
pub fn synthetic_batches(
    key: PrngKey,
    num_batches: usize,
    batch_size: usize,
    stamp: usize,
    noise_std: f32,
) -> Result<Vec<Batch>> {
    let mut batches = Vec::with_capacity(num_batches);
    let mut key = key;
    for _ in 0..num_batches {
        let (next, batch_key) = key.split();
        key = next;
        batches.push(synthetic_batch(batch_key, batch_size, stamp, noise_std)?);
    }
    Ok(batches)
}

fn synthetic_batch(key: PrngKey, batch_size: usize, stamp: usize, noise_std: f32) -> Result<Batch> {
    let kpsf = gaussian_kpsf(stamp, stamp as f32 / 16.0);
    let mut image = Array3::zeros((batch_size, stamp, stamp));
    let mut kpsf_real = Array3::zeros((batch_size, stamp, stamp));
    let mut kpsf_imag = Array3::zeros((batch_size, stamp, stamp));
    // White pixel noise of std sigma has flat spectral power sigma^2 * N under
    // the unnormalized forward transform.
    let log_power = (noise_std * noise_std * (stamp * stamp) as f32).ln();
    let power_spectrum = Array3::from_elem((batch_size, stamp, stamp), log_power);
    let noise = Array1::from_elem(batch_size, noise_std);

    let mut key = key;
    for b in 0..batch_size {
        let (next, example_key) = key.split();
        key = next;
        let mut rng = example_key.rng();

        let cx = stamp as f32 * rng.gen_range(0.35..0.65);
        let cy = stamp as f32 * rng.gen_range(0.35..0.65);
        let sx = stamp as f32 * rng.gen_range(0.05..0.12);
        let sy = stamp as f32 * rng.gen_range(0.05..0.12);
        let amp = rng.gen_range(0.5..1.5);

        for r in 0..stamp {
            for c in 0..stamp {
                let dr = (r as f32 - cy) / sy;
                let dc = (c as f32 - cx) / sx;
                let eps: f32 = rng.sample(StandardNormal);
                image[[b, r, c]] = amp * (-0.5 * (dr * dr + dc * dc)).exp() + noise_std * eps;
                kpsf_real[[b, r, c]] = kpsf[[r, c]].re;
                kpsf_imag[[b, r, c]] = kpsf[[r, c]].im;
            }
        }
    }

    Batch::new(image, kpsf_real, kpsf_imag, noise, power_spectrum)
}

/// Fourier transform of a periodic, origin-centered Gaussian kernel
fn gaussian_kpsf(stamp: usize, sigma: f32) -> Array2<num_complex::Complex32> {
    let mut kernel = Array2::zeros((stamp, stamp));
    let mut total = 0.0;
    for r in 0..stamp {
        for c in 0..stamp {
            // Wrap-around distance keeps the kernel centered at the origin.
            let dr = (r.min(stamp - r)) as f32 / sigma;
            let dc = (c.min(stamp - c)) as f32 / sigma;
            let v = (-0.5 * (dr * dr + dc * dc)).exp();
            kernel[[r, c]] = v;
            total += v;
        }
    }
    kernel.mapv_inplace(|v| v / total);
    fft2_real(&kernel)
}
