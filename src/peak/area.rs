//! Peak area estimation.
//!
//! Areas are summed by expanding outward from the apex, one ion at a time,
//! until the trailing edge stops falling or drops below a tolerance of the
//! accumulated area. The trailing edge is averaged over three points to
//! ride over single-scan noise.

use crate::math;
use crate::matrix::IntensityMatrix;

use super::{Peak, PeakError};

/// Default tolerance, as a percentage of the accumulated area.
pub const DEFAULT_TOL: f64 = 0.5;

/// Area integration result for one ion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IonArea {
    /// Integrated intensity over the detected bounds.
    pub area: f64,
    /// Left boundary offset from the apex, in scans.
    pub left: usize,
    /// Right boundary offset from the apex, in scans.
    pub right: usize,
    /// Whether the left bound ran into a neighbouring peak.
    pub left_shared: bool,
    /// Whether the right bound ran into a neighbouring peak.
    pub right_shared: bool,
}

/// Integrates one side of a peak, walking outward from the apex.
///
/// `values` starts at the apex and proceeds outward. Returns the summed
/// area, the boundary offset and whether the edge started rising again
/// (a shared bound with a neighbouring peak).
pub fn half_area(values: &[f64], max_bound: usize, tol: f64) -> (f64, usize, bool) {
    // halve and convert from percent
    let tol = tol / 200.0;
    // number of points the trailing edge is averaged over
    const WIDE: usize = 3;

    if values.is_empty() {
        return (0.0, 0, false);
    }

    let edge_at = |index: usize| {
        let end = (index + WIDE).min(values.len());
        values[index..end].iter().sum::<f64>() / WIDE as f64
    };

    let mut area = values[0];
    let mut edge = edge_at(0);
    let mut old_edge = 2.0 * edge;
    let mut index = 1;
    let limit = if max_bound < 1 {
        values.len()
    } else {
        (max_bound + 1).min(values.len())
    };

    while area * tol < edge && edge < old_edge && index < limit {
        old_edge = edge;
        area += values[index];
        edge = edge_at(index);
        index += 1;
    }
    let shared = edge >= old_edge;

    (area, index - 1, shared)
}

/// Integrates a single ion trace around an apex.
///
/// Runs [`half_area`] over the reversed left side and the forward right
/// side; the apex intensity, counted by both halves, is subtracted once.
pub fn ion_area(values: &[f64], apex: usize, max_bound: usize, tol: f64) -> IonArea {
    let lhs: Vec<f64> = values[..=apex].iter().rev().copied().collect();
    let (left_area, left, left_shared) = half_area(&lhs, max_bound, tol);

    let rhs = &values[apex..];
    let (mut right_area, right, right_shared) = half_area(rhs, max_bound, tol);
    right_area -= values[apex];

    IonArea {
        area: left_area + right_area,
        left,
        right,
        left_shared,
        right_shared,
    }
}

/// Sums the areas of every apexing ion of a peak.
///
/// Returns the total area together with the per-ion area map. Only masses
/// with non-zero apex intensity contribute.
pub fn peak_sum_area(
    im: &IntensityMatrix,
    peak: &Peak,
    max_bound: usize,
) -> Result<(f64, Vec<(f64, f64)>), PeakError> {
    let ms = peak.mass_spectrum().ok_or(PeakError::NoSpectrum)?;
    let apex = im.index_at_time(peak.rt())?;

    let mut total = 0.0;
    let mut areas = Vec::new();
    for (ii, &intensity) in ms.intensities().iter().enumerate() {
        if intensity <= 0.0 {
            continue;
        }
        let mass = ms.mass_list()[ii];
        let column = im
            .ic_at_index(im.index_of_mass(mass))?
            .intensities()
            .to_vec();
        let result = ion_area(&column, apex, max_bound, DEFAULT_TOL);
        total += result.area;
        areas.push((mass, result.area));
    }

    Ok((total, areas))
}

/// Areas of the `n` most intense ions of a peak.
pub fn peak_top_ion_areas(
    im: &IntensityMatrix,
    peak: &Peak,
    n_top_ions: usize,
    max_bound: usize,
) -> Result<Vec<(f64, f64)>, PeakError> {
    let apex = im.index_at_time(peak.rt())?;

    let mut areas = Vec::with_capacity(n_top_ions);
    for ion in peak.top_ions(n_top_ions) {
        let column = im.ic_at_mass(Some(ion))?.intensities().to_vec();
        let result = ion_area(&column, apex, max_bound, DEFAULT_TOL);
        areas.push((ion, result.area));
    }
    Ok(areas)
}

/// Integrates a peak in place: sets its total area, per-ion area map and
/// point bounds (the outermost left/right offsets over its ions).
pub fn integrate_peak(
    im: &IntensityMatrix,
    peak: &mut Peak,
    max_bound: usize,
) -> Result<(), PeakError> {
    let (mass_list, apex_intensities) = match peak.mass_spectrum() {
        Some(ms) => (ms.mass_list().to_vec(), ms.intensities().to_vec()),
        None => return Err(PeakError::NoSpectrum),
    };
    let apex = im.index_at_time(peak.rt())?;

    let mut total = 0.0;
    let mut areas = Vec::new();
    let (mut max_left, mut max_right) = (0_usize, 0_usize);
    for (ii, &intensity) in apex_intensities.iter().enumerate() {
        if intensity <= 0.0 {
            continue;
        }
        let mass = mass_list[ii];
        let column = im
            .ic_at_index(im.index_of_mass(mass))?
            .intensities()
            .to_vec();
        let result = ion_area(&column, apex, max_bound, DEFAULT_TOL);
        total += result.area;
        areas.push((mass, result.area));
        max_left = max_left.max(result.left);
        max_right = max_right.max(result.right);
    }

    let apex_scan = peak.bounds().map(|(_, scan, _)| scan).unwrap_or(apex);
    peak.set_bounds(max_left, apex_scan, max_right);
    peak.set_area(total.max(0.0));
    peak.set_ion_areas(areas);
    Ok(())
}

/// Median left and right boundary offsets over the apexing ions.
///
/// With `shared` false, bounds that ran into a neighbouring peak are
/// excluded from the medians.
pub fn median_bounds(
    im: &IntensityMatrix,
    peak: &Peak,
    shared: bool,
) -> Result<(f64, f64), PeakError> {
    let ms = peak.mass_spectrum().ok_or(PeakError::NoSpectrum)?;
    let mut apex = im.index_at_time(peak.rt())?;
    if let Some((_, bound_apex, _)) = peak.bounds() {
        // trust the stored apex when it agrees with the RT lookup
        if bound_apex + 1 >= apex && bound_apex <= apex + 1 {
            apex = bound_apex;
        }
    }

    let mut lefts = Vec::new();
    let mut rights = Vec::new();
    for (ii, &intensity) in ms.intensities().iter().enumerate() {
        if intensity <= 0.0 {
            continue;
        }
        let column = im
            .ic_at_index(im.index_of_mass(ms.mass_list()[ii]))?
            .intensities()
            .to_vec();
        let result = ion_area(&column, apex, 0, DEFAULT_TOL);
        if shared || !result.left_shared {
            lefts.push(result.left as f64);
        }
        if shared || !result.right_shared {
            rights.push(result.right as f64);
        }
    }

    Ok((math::median(&lefts), math::median(&rights)))
}
