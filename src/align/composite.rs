//! Composite peaks from aligned rows.

use log::warn;

use crate::math;
use crate::peak::Peak;
use crate::spectrum::MassSpectrum;

/// Modified z-score threshold for the retention-time outlier test.
const OUTLIER_THRESHOLD: f64 = 2.5;

/// Synthesizes one peak from the peaks aligned at a position.
///
/// The retention time is the mean of the contributing peaks; the spectrum
/// is the per-mass mean after scaling each contributing spectrum so its
/// maximum is 100. With `ignore_outliers`, peaks already flagged as
/// outliers are excluded, and rows of more than three peaks are first
/// screened by a median-absolute-deviation test on their retention times.
///
/// Returns `None` when no peak contributes a usable spectrum.
pub fn composite_peak(peaks: &[&Peak], ignore_outliers: bool) -> Option<Peak> {
    let mut excluded = vec![false; peaks.len()];
    if ignore_outliers {
        for (flag, peak) in excluded.iter_mut().zip(peaks) {
            *flag = peak.is_outlier();
        }
        if peaks.len() > 3 {
            let rts: Vec<f64> = peaks.iter().map(|p| p.rt()).collect();
            for (flag, is_outlier) in excluded
                .iter_mut()
                .zip(math::median_outliers(&rts, OUTLIER_THRESHOLD))
            {
                *flag = *flag || is_outlier;
            }
        }
    }

    let mut avg_rt = 0.0;
    let mut avg_spec: Vec<f64> = Vec::new();
    let mut mass_list: Vec<f64> = Vec::new();
    let mut count = 0_usize;

    for (peak, &skip) in peaks.iter().zip(&excluded) {
        if skip {
            continue;
        }
        let ms = match peak.mass_spectrum() {
            Some(ms) if !ms.is_empty() => ms,
            _ => continue,
        };
        if avg_spec.is_empty() {
            avg_spec = vec![0.0; ms.len()];
            mass_list = ms.mass_list().to_vec();
        } else if ms.len() != avg_spec.len() {
            warn!(
                "skipping peak at {:.2} s: spectrum length {} differs from {}",
                peak.rt(),
                ms.len(),
                avg_spec.len()
            );
            continue;
        }

        // scale so the strongest ion reads 100
        let max = ms.intensities().iter().copied().fold(0.0_f64, f64::max);
        let scale = if max > 0.0 { 100.0 / max } else { 0.0 };
        for (acc, &v) in avg_spec.iter_mut().zip(ms.intensities()) {
            *acc += v * scale;
        }
        avg_rt += peak.rt();
        count += 1;
    }

    if count == 0 {
        return None;
    }
    for v in &mut avg_spec {
        *v /= count as f64;
    }
    let spectrum = MassSpectrum::new(mass_list, avg_spec)
        .unwrap_or_else(|_| unreachable!("averaged spectrum keeps the mass axis"));
    Some(Peak::with_spectrum(avg_rt / count as f64, spectrum))
}
