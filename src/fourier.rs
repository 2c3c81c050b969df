//! 2-D FFT helpers
//!
//! Thin wrappers over `rustfft` for the square stamps this crate works with.
//! Convention: the forward transform is unnormalized and the inverse carries
//! the full `1/(rows*cols)` factor, matching the numpy default the reference
//! pipelines were tuned against.

use ndarray::Array2;
use num_complex::Complex32;
use rustfft::FftPlanner;

/// Forward 2-D FFT of a real field
pub fn fft2_real(field: &Array2<f32>) -> Array2<Complex32> {
    let complex = field.mapv(|v| Complex32::new(v, 0.0));
    fft2(&complex)
}

/// Forward 2-D FFT (unnormalized)
pub fn fft2(field: &Array2<Complex32>) -> Array2<Complex32> {
    transform2(field, false)
}

/// Inverse 2-D FFT, scaled by `1/(rows*cols)`
pub fn ifft2(field: &Array2<Complex32>) -> Array2<Complex32> {
    let (rows, cols) = field.dim();
    let scale = 1.0 / (rows * cols) as f32;
    transform2(field, true).mapv(|v| v * scale)
}

fn transform2(field: &Array2<Complex32>, inverse: bool) -> Array2<Complex32> {
    let (rows, cols) = field.dim();
    let mut out = field.clone();
    let mut planner = FftPlanner::<f32>::new();

    // Rows first.
    let row_fft = if inverse {
        planner.plan_fft_inverse(cols)
    } else {
        planner.plan_fft_forward(cols)
    };
    let mut buf: Vec<Complex32> = Vec::with_capacity(cols.max(rows));
    for r in 0..rows {
        buf.clear();
        buf.extend((0..cols).map(|c| out[[r, c]]));
        row_fft.process(&mut buf);
        for c in 0..cols {
            out[[r, c]] = buf[c];
        }
    }

    // Then columns.
    let col_fft = if inverse {
        planner.plan_fft_inverse(rows)
    } else {
        planner.plan_fft_forward(rows)
    };
    for c in 0..cols {
        buf.clear();
        buf.extend((0..rows).map(|r| out[[r, c]]));
        col_fft.process(&mut buf);
        for r in 0..rows {
            out[[r, c]] = buf[r];
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn test_fft2_of_impulse_is_flat() {
        let mut field = Array2::zeros((4, 4));
        field[[0, 0]] = 1.0;
        let spectrum = fft2_real(&field);
        for v in spectrum.iter() {
            assert_abs_diff_eq!(v.re, 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(v.im, 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_fft2_dc_component_is_sum() {
        let field = arr2(&[[1.0_f32, 2.0], [3.0, 4.0]]);
        let spectrum = fft2_real(&field);
        assert_abs_diff_eq!(spectrum[[0, 0]].re, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_ifft2_inverts_fft2() {
        let field = arr2(&[
            [0.1_f32, -0.4, 0.9, 0.0],
            [1.2, 0.3, -0.7, 0.5],
            [0.0, 0.8, 0.2, -1.1],
            [-0.3, 0.6, 0.4, 0.7],
        ]);
        let round_trip = ifft2(&fft2_real(&field));
        for (orig, rt) in field.iter().zip(round_trip.iter()) {
            assert_abs_diff_eq!(rt.re, *orig, epsilon = 1e-5);
            assert_abs_diff_eq!(rt.im, 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_parseval_energy_ratio() {
        let field = arr2(&[[1.0_f32, 0.0, 2.0, 0.0]; 4]);
        let spectrum = fft2_real(&field);
        let spatial_energy: f32 = field.iter().map(|v| v * v).sum();
        let spectral_energy: f32 = spectrum.iter().map(|v| v.norm_sqr()).sum();
        // Unnormalized forward transform: spectral energy is N times spatial.
        assert_abs_diff_eq!(spectral_energy, spatial_energy * 16.0, epsilon = 1e-3);
    }
}
