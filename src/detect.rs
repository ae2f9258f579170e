//! Peak detection after Biller and Biemann (1974).
//!
//! Works in three steps over a binned intensity matrix:
//!
//! 1. for every mass channel, find the scans where the ion apexes inside a
//!    sliding window;
//! 2. coalesce apexes from neighbouring scans into the scan with the
//!    highest summed apex intensity, compensating for spectral skew;
//! 3. emit one peak per scan that retained apexing ions, carrying the
//!    apex row as its mass spectrum.

use ndarray::Array2;
use rayon::prelude::*;

use crate::chromatogram::{ChromatogramKind, IonChromatogram};
use crate::matrix::IntensityMatrix;
use crate::peak::Peak;
use crate::spectrum::MassSpectrum;

/// Scan indices at which a single ion trace apexes.
///
/// A point is an apex when it exceeds every other value in a window of
/// `points` scans (widened to an odd count, minimum 3). Plateaus are
/// handled by remembering the left edge of a rise-then-flat pattern and
/// emitting the plateau midpoint when the trace falls again; plateaus with
/// flats on both sides are discarded.
pub fn maxima_indices(values: &[f64], points: usize) -> Vec<usize> {
    let half = (points / 2).max(1);
    let points = 2 * half + 1;

    let mut apexes = Vec::new();
    if values.len() < points {
        return apexes;
    }

    let mut edge: Option<usize> = None;
    for index in 0..=(values.len() - points) {
        let mid = values[index + half];
        let left = values[index..index + half]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let right = values[index + half + 1..index + points]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        if mid > left && mid > right {
            // the maximum is in the middle
            apexes.push(index + half);
            edge = None;
        } else if mid > left && mid == right {
            // start of a plateau following a rise
            edge = Some(index + half);
        } else if mid == left && mid > right {
            // start of the fall from a plateau
            if let Some(start) = edge {
                apexes.push((start + index + half) / 2);
            }
            edge = None;
        }
    }
    apexes
}

/// Retention time and intensity of every local maximum of an ion trace.
pub fn maxima_list(ic: &IonChromatogram, points: usize) -> Vec<(f64, f64)> {
    maxima_indices(ic.intensities(), points)
        .into_iter()
        .map(|ii| (ic.times()[ii], ic.intensities()[ii]))
        .collect()
}

/// Local maxima restricted to a retention-time window.
///
/// Only maxima with `|rt - target_rt| < window_secs` are returned; used by
/// the gap filler to search around an expected elution time.
pub fn maxima_list_reduced(
    ic: &IonChromatogram,
    target_rt: f64,
    points: usize,
    window_secs: f64,
) -> Vec<(f64, f64)> {
    maxima_list(ic, points)
        .into_iter()
        .filter(|(rt, _)| (rt - target_rt).abs() < window_secs)
        .collect()
}

/// The apex matrix: intensities at apex positions, zero elsewhere, with
/// neighbouring-scan apexes coalesced.
///
/// `points` is the per-ion maxima window; `scans` the coalescing radius.
/// Within each window of `scans` rows the row with the highest summed
/// intensity absorbs the non-zero entries of the others.
pub fn maxima_matrix(im: &IntensityMatrix, points: usize, scans: usize) -> Array2<f64> {
    let (rows, cols) = im.size();
    let raw = im.intensity_array();

    let apex_columns: Vec<Vec<usize>> = (0..cols)
        .into_par_iter()
        .map(|col| maxima_indices(&raw.column(col).to_vec(), points))
        .collect();

    let mut maxima = Array2::zeros((rows, cols));
    for (col, apexes) in apex_columns.iter().enumerate() {
        for &row in apexes {
            maxima[[row, col]] = raw[[row, col]];
        }
    }

    // combine spectra within 'scans' scans
    let half = (scans / 2) as isize;
    let scans = scans.max(1);
    for row_idx in 0..rows as isize {
        let mut best = 0.0;
        let mut loc = 0_isize;

        for ii in 0..scans as isize {
            let candidate = row_idx - half + ii;
            if candidate >= 0 && (candidate as usize) < rows {
                let tic: f64 = maxima.row(candidate as usize).sum();
                if tic > best {
                    best = tic;
                    loc = ii;
                }
            }
        }

        let dest = row_idx - half + loc;
        if dest < 0 || dest as usize >= rows {
            continue;
        }
        for ii in 0..scans as isize {
            if ii == loc {
                continue;
            }
            let source = row_idx - half + ii;
            if source < 0 || source as usize >= rows {
                continue;
            }
            for col in 0..cols {
                let value = maxima[[source as usize, col]];
                if value != 0.0 {
                    maxima[[dest as usize, col]] += value;
                    maxima[[source as usize, col]] = 0.0;
                }
            }
        }
    }

    maxima
}

/// Detects peaks in a binned intensity matrix.
///
/// Emits one [`Peak`] per scan that holds apexing ions after coalescing,
/// with the full mass axis as the peak's spectrum and point bounds
/// `(0, scan, 0)`.
pub fn biller_biemann(im: &IntensityMatrix, points: usize, scans: usize) -> Vec<Peak> {
    let maxima = maxima_matrix(im, points, scans);
    let mut peaks = Vec::new();

    for (row_idx, row) in maxima.outer_iter().enumerate() {
        if row.sum() > 0.0 {
            let rt = im.times()[row_idx];
            let spectrum = MassSpectrum::new(im.masses().to_vec(), row.to_vec())
                .unwrap_or_else(|_| unreachable!("row length equals mass axis"));
            let mut peak = Peak::with_spectrum(rt, spectrum);
            peak.set_bounds(0, row_idx, 0);
            peaks.push(peak);
        }
    }

    log::info!(
        "Biller-Biemann: {} peak(s) detected (points={}, scans={})",
        peaks.len(),
        points,
        scans
    );
    peaks
}

/// Reconstructs the TIC from apexing ions only.
pub fn sum_maxima(im: &IntensityMatrix, points: usize, scans: usize) -> IonChromatogram {
    let maxima = maxima_matrix(im, points, 1);
    let rows = maxima.nrows();
    let half = (scans / 2) as isize;

    let mut sums = Vec::with_capacity(rows);
    for row in 0..rows as isize {
        let mut value = 0.0;
        for ii in 0..scans.max(1) as isize {
            let idx = row - half + ii;
            if idx >= 0 && (idx as usize) < rows {
                value += maxima.row(idx as usize).sum();
            }
        }
        sums.push(value);
    }

    IonChromatogram::new(sums, im.times().to_vec(), ChromatogramKind::Tic)
        .unwrap_or_else(|_| unreachable!("one sum per scan"))
}
