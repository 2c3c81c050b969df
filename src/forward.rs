//! PSF forward model
//!
//! Maps a decoded image through the known point-spread function to produce a
//! predicted observation. The PSF arrives either as a real spatial kernel or as
//! a complex Fourier-domain transfer function split into real/imaginary parts;
//! both paths apply a circular convolution in frequency space. Pure functions,
//! applied strictly per example.
//!
//! [`predict_adjoint`] is the transpose of [`predict`] (convolution with the
//! conjugated kernel), which is all the objective needs to backpropagate
//! through this stage.

use crate::data::Batch;
use crate::fourier::{fft2, fft2_real, ifft2};
use crate::{Error, Result};
use ndarray::{Array2, Array3, Zip};
use num_complex::Complex32;

/// Point-spread function for one example
#[derive(Clone, Debug)]
pub enum Psf {
    /// Real spatial kernel, same stamp shape as the image
    Spatial(Array2<f32>),
    /// Complex Fourier-domain kernel split into parts
    Fourier {
        /// Real part, `(stamp, stamp)`
        real: Array2<f32>,
        /// Imaginary part, `(stamp, stamp)`
        imag: Array2<f32>,
    },
}

impl Psf {
    fn shape(&self) -> (usize, usize) {
        match self {
            Psf::Spatial(kernel) => kernel.dim(),
            Psf::Fourier { real, .. } => real.dim(),
        }
    }

    /// Fourier-domain transfer function of this PSF
    fn transfer(&self) -> Array2<Complex32> {
        match self {
            Psf::Spatial(kernel) => fft2_real(kernel),
            Psf::Fourier { real, imag } => {
                Zip::from(real).and(imag).map_collect(|&re, &im| Complex32::new(re, im))
            }
        }
    }
}

/// Convolve one decoded image with its PSF
pub fn predict(decoded: &Array2<f32>, psf: &Psf) -> Result<Array2<f32>> {
    check_shapes(decoded, psf)?;
    Ok(apply_transfer(decoded, &psf.transfer()))
}

/// Transpose of [`predict`] for the same PSF: pulls an upstream gradient on the
/// predicted observation back to the decoded image
pub fn predict_adjoint(upstream: &Array2<f32>, psf: &Psf) -> Result<Array2<f32>> {
    check_shapes(upstream, psf)?;
    let conjugate = psf.transfer().mapv(|v| v.conj());
    Ok(apply_transfer(upstream, &conjugate))
}

/// Map [`predict`] over every example of a batch using its Fourier PSFs
pub fn predict_batch(decoded: &Array3<f32>, batch: &Batch) -> Result<Array3<f32>> {
    map_batch(decoded, batch, false)
}

/// Map [`predict_adjoint`] over every example of a batch
pub fn predict_batch_adjoint(upstream: &Array3<f32>, batch: &Batch) -> Result<Array3<f32>> {
    map_batch(upstream, batch, true)
}

fn map_batch(images: &Array3<f32>, batch: &Batch, adjoint: bool) -> Result<Array3<f32>> {
    if images.dim() != batch.image.dim() {
        return Err(Error::shape_mismatch("forward model batch", batch.image.dim(), images.dim()));
    }
    let mut out = Array3::zeros(images.dim());
    for b in 0..batch.len() {
        let psf = Psf::Fourier {
            real: batch.kpsf_real.index_axis(ndarray::Axis(0), b).to_owned(),
            imag: batch.kpsf_imag.index_axis(ndarray::Axis(0), b).to_owned(),
        };
        let image = images.index_axis(ndarray::Axis(0), b).to_owned();
        let mapped =
            if adjoint { predict_adjoint(&image, &psf)? } else { predict(&image, &psf)? };
        out.index_axis_mut(ndarray::Axis(0), b).assign(&mapped);
    }
    Ok(out)
}

fn apply_transfer(field: &Array2<f32>, transfer: &Array2<Complex32>) -> Array2<f32> {
    let spectrum = fft2_real(field);
    let product = &spectrum * transfer;
    ifft2(&product).mapv(|v| v.re)
}

fn check_shapes(field: &Array2<f32>, psf: &Psf) -> Result<()> {
    if field.dim() != psf.shape() {
        return Err(Error::shape_mismatch("forward model", field.dim(), psf.shape()));
    }
    Ok(())
}
