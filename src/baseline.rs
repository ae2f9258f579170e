//! White top-hat baseline correction.
//!
//! The baseline of an ion chromatogram is estimated by a morphological
//! opening (grayscale erosion followed by dilation) with a flat
//! one-dimensional structuring element, and the corrected trace is the
//! signal minus its opening. Features narrower than the element survive;
//! the slowly varying baseline is removed.

use crate::chromatogram::IonChromatogram;
use crate::matrix::IntensityMatrix;
use crate::smooth::SmoothError;
use crate::units::{window_points, WindowSize};

/// Default structuring-element size as a fraction of the trace length.
const STRUCT_ELEMENT_FRAC: f64 = 0.2;

/// Applies white top-hat baseline correction to an ion chromatogram.
///
/// `struct_elem` is the structuring-element size in points or as a time
/// string; when `None`, 20% of the trace length is used.
pub fn tophat(
    ic: &IonChromatogram,
    struct_elem: Option<&WindowSize>,
) -> Result<IonChromatogram, SmoothError> {
    let size = match struct_elem {
        Some(window) => window_points(window, ic.time_step(), false)?,
        None => ((ic.len() as f64) * STRUCT_ELEMENT_FRAC).round() as usize,
    };
    let size = size.max(1);

    let values = ic.intensities();
    let opened = dilate(&erode(values, size), size);
    let corrected: Vec<f64> = values
        .iter()
        .zip(&opened)
        .map(|(v, o)| v - o)
        .collect();

    let mut out = ic.clone();
    out.set_intensities(corrected)
        .unwrap_or_else(|_| unreachable!("opening preserves length"));
    Ok(out)
}

/// Applies white top-hat baseline correction to every mass channel.
pub fn tophat_im(
    im: &IntensityMatrix,
    struct_elem: Option<&WindowSize>,
) -> Result<IntensityMatrix, SmoothError> {
    im.map_columns(|ic| tophat(ic, struct_elem))
}

/// Grayscale erosion with a flat element of `size` points, clipped at the
/// trace ends.
fn erode(values: &[f64], size: usize) -> Vec<f64> {
    sliding(values, size, f64::min, f64::INFINITY)
}

/// Grayscale dilation with a flat element of `size` points.
fn dilate(values: &[f64], size: usize) -> Vec<f64> {
    sliding(values, size, f64::max, f64::NEG_INFINITY)
}

fn sliding(values: &[f64], size: usize, pick: fn(f64, f64) -> f64, init: f64) -> Vec<f64> {
    let len = values.len();
    let left = size / 2;
    let right = size - 1 - left;
    let mut out = Vec::with_capacity(len);
    for index in 0..len {
        let lo = index.saturating_sub(left);
        let hi = (index + right + 1).min(len);
        let value = values[lo..hi].iter().copied().fold(init, pick);
        out.push(value);
    }
    out
}
