//! Intensity and ion-count peak filters.

use super::{Peak, PeakError};

/// Zeroes spectrum intensities below `percent` of each peak's strongest
/// ion.
///
/// Returns new peaks with refreshed UIDs; the inputs are untouched. Peaks
/// without a spectrum pass through unchanged.
pub fn rel_threshold(peaks: &[Peak], percent: f64) -> Result<Vec<Peak>, PeakError> {
    if percent <= 0.0 {
        return Err(PeakError::NonPositivePercent(percent));
    }

    let mut filtered = Vec::with_capacity(peaks.len());
    for peak in peaks {
        let mut peak = peak.clone();
        let thresholded = match peak.mass_spectrum() {
            Some(ms) => {
                let max = ms.intensities().iter().copied().fold(0.0_f64, f64::max);
                // max is assumed large, so divide first
                let cutoff = max / 100.0 * percent;
                let mut ms = ms.clone();
                let values: Vec<f64> = ms
                    .intensities()
                    .iter()
                    .map(|&v| if v < cutoff { 0.0 } else { v })
                    .collect();
                ms.set_intensities(values)?;
                Some(ms)
            }
            None => None,
        };
        if let Some(ms) = thresholded {
            peak.set_mass_spectrum(ms);
        }
        filtered.push(peak);
    }
    Ok(filtered)
}

/// Keeps peaks with at least `n` ions at or above `cutoff`.
///
/// Applying the filter twice with the same parameters gives the same
/// result. Peaks without a spectrum count zero qualifying ions and are
/// dropped.
pub fn num_ions_threshold(peaks: &[Peak], n: usize, cutoff: f64) -> Vec<Peak> {
    peaks
        .iter()
        .filter(|peak| {
            peak.mass_spectrum()
                .map(|ms| ms.n_above(cutoff) >= n)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}
