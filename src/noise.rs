//! Data-driven noise estimation.
//!
//! The noise floor of a chromatogram is estimated by repeatedly placing
//! windows at random positions and taking the minimum median absolute
//! deviation observed. The minimum over many windows lands on a stretch of
//! pure noise even when much of the trace is covered by peaks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::chromatogram::IonChromatogram;
use crate::math;
use crate::smooth::SmoothError;
use crate::units::{window_points, WindowSize};

/// Default window width in points.
pub const DEFAULT_WINDOW: usize = 256;
/// Default number of random windows.
pub const DEFAULT_N_WINDOWS: usize = 1024;

/// Estimates the noise level of a chromatogram.
///
/// Draws `n_windows` random window positions (repeated positions are drawn
/// but not re-analysed), computes the MAD of each window and returns the
/// minimum. Pass a seed for reproducible estimates.
pub fn window_analyzer(
    ic: &IonChromatogram,
    window: &WindowSize,
    n_windows: usize,
    seed: Option<u64>,
) -> Result<f64, SmoothError> {
    let window_pts = window_points(window, ic.time_step(), false)?;
    let values = ic.intensities();
    // a window wider than the trace degrades to one whole-trace window
    let window_pts = window_pts.min(values.len());

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let max_start = values.len().saturating_sub(window_pts);
    let max_value = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_value = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut noise_level = (max_value - min_value).abs();

    let mut seen = vec![false; max_start + 1];
    for _ in 0..n_windows {
        let start = rng.gen_range(0..=max_start);
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mad = math::mad(&values[start..start + window_pts]);
        if mad < noise_level {
            noise_level = mad;
        }
    }

    Ok(noise_level)
}
