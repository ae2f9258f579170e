//! Savitzky-Golay polynomial smoothing.
//!
//! The filter fits a degree-`d` polynomial by least squares over a sliding
//! window of `2h + 1` points and replaces each point with the fitted value.
//! The coefficients are computed once per call by solving the normal
//! equations `(A^T A) w = e_0` through a Cholesky decomposition, then
//! evaluating the fitted polynomial at every window offset.

use nalgebra::{DMatrix, DVector};

use crate::chromatogram::IonChromatogram;
use crate::matrix::IntensityMatrix;
use crate::units::{window_points, WindowSize};

use super::SmoothError;

/// Filter coefficients for a symmetric window of `2 * half + 1` points and
/// a fitting polynomial of the given degree (0-th derivative row).
fn coefficients(half: usize, degree: usize) -> Result<Vec<f64>, SmoothError> {
    let points = 2 * half + 1;
    if points < degree + 1 {
        return Err(SmoothError::DegreeTooLarge { points, degree });
    }

    // design matrix: row per window offset, column per polynomial power
    let design = DMatrix::from_fn(points, degree + 1, |i, j| {
        (i as f64 - half as f64).powi(j as i32)
    });
    let normal = design.transpose() * &design;

    let chol = normal
        .cholesky()
        .ok_or(SmoothError::IllConditioned { degree })?;
    let mut rhs = DVector::zeros(degree + 1);
    rhs[0] = 1.0;
    let weights = chol.solve(&rhs);

    let mut coeff = vec![0.0; points];
    for (k, c) in coeff.iter_mut().enumerate() {
        let offset = k as f64 - half as f64;
        let mut value = 0.0;
        for m in 0..=degree {
            value += weights[m] * offset.powi(m as i32);
        }
        *c = value;
    }
    Ok(coeff)
}

/// Applies the coefficient stencil, zero-padding past the ends so the
/// output length equals the input length.
fn convolve(signal: &[f64], coeff: &[f64]) -> Vec<f64> {
    let half = coeff.len() / 2;
    let mut out = vec![0.0; signal.len()];
    for (i, slot) in out.iter_mut().enumerate() {
        let mut acc = 0.0;
        for (k, &c) in coeff.iter().enumerate() {
            let j = i as isize + k as isize - half as isize;
            if j >= 0 && (j as usize) < signal.len() {
                acc += c * signal[j as usize];
            }
        }
        *slot = acc;
    }
    out
}

/// Applies a Savitzky-Golay filter to an ion chromatogram.
///
/// The window may be a point count or a time string; the polynomial degree
/// defaults to 2 in typical pipelines.
pub fn savitzky_golay(
    ic: &IonChromatogram,
    window: &WindowSize,
    degree: usize,
) -> Result<IonChromatogram, SmoothError> {
    let half = window_points(window, ic.time_step(), true)?;
    let coeff = coefficients(half, degree)?;

    let mut smoothed = ic.clone();
    smoothed
        .set_intensities(convolve(ic.intensities(), &coeff))
        .unwrap_or_else(|_| unreachable!("convolution preserves length"));
    Ok(smoothed)
}

/// Applies a Savitzky-Golay filter to every mass channel of a matrix.
pub fn savitzky_golay_im(
    im: &IntensityMatrix,
    window: &WindowSize,
    degree: usize,
) -> Result<IntensityMatrix, SmoothError> {
    im.map_columns(|ic| savitzky_golay(ic, window, degree))
}
