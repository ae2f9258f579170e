//! Signal peaks.
//!
//! A peak is an apex retention time with, usually, the mass spectrum
//! observed at the apex. Peaks carry their integrated area and a per-ion
//! area map once integration has run, point bounds in scan units, and a
//! deterministic UID derived from the two strongest masses and the
//! retention time. The UID is recomputed whenever the spectrum changes.

pub mod area;
pub mod filter;

use log::warn;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::chromatogram::ChromatogramError;
use crate::matrix::MatrixError;
use crate::spectrum::{MassSpectrum, SpectrumError};

/// Errors raised by peak operations.
#[derive(Debug, thiserror::Error)]
pub enum PeakError {
    /// The operation needs an apex spectrum but the peak has none.
    #[error("the peak has no mass spectrum")]
    NoSpectrum,

    /// A mass range with `lo >= hi` or outside the spectrum.
    #[error("invalid mass range {lo:.3}..{hi:.3}")]
    InvalidMassRange { lo: f64, hi: f64 },

    /// A mass outside the spectrum's axis.
    #[error("mass {mass:.3} outside spectrum range {min:.3} to {max:.3}")]
    MassOutOfRange { mass: f64, min: f64, max: f64 },

    /// Cropping removed every channel.
    #[error("cropping left the mass spectrum empty")]
    EmptySpectrum,

    /// A relative threshold that is not a positive percentage.
    #[error("'percent' must be greater than zero, got {0}")]
    NonPositivePercent(f64),

    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Chromatogram(#[from] ChromatogramError),
}

/// A detected signal peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    rt: f64,
    mass_spectrum: Option<MassSpectrum>,
    bounds: Option<(usize, usize, usize)>,
    area: Option<f64>,
    ion_areas: Vec<(f64, f64)>,
    outlier: bool,
    uid: String,
}

impl Peak {
    /// Creates a peak with no apex spectrum (e.g. a composite placeholder).
    pub fn new(rt: f64) -> Self {
        let mut peak = Self {
            rt,
            mass_spectrum: None,
            bounds: None,
            area: None,
            ion_areas: Vec::new(),
            outlier: false,
            uid: String::new(),
        };
        peak.make_uid();
        peak
    }

    /// Creates a peak carrying the mass spectrum observed at its apex.
    pub fn with_spectrum(rt: f64, spectrum: MassSpectrum) -> Self {
        let mut peak = Self {
            rt,
            mass_spectrum: Some(spectrum),
            bounds: None,
            area: None,
            ion_areas: Vec::new(),
            outlier: false,
            uid: String::new(),
        };
        peak.make_uid();
        peak
    }

    /// Apex retention time in seconds.
    pub fn rt(&self) -> f64 {
        self.rt
    }

    /// The deterministic peak identifier.
    ///
    /// With a spectrum present the UID is `"m1-m2-ratio-rt"` where `m1` and
    /// `m2` are the two most intense masses and
    /// `ratio = trunc(100 * i2 / i1)`; without one it is the retention time
    /// alone. Retention times are formatted with two decimals.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// The apex mass spectrum, if any.
    pub fn mass_spectrum(&self) -> Option<&MassSpectrum> {
        self.mass_spectrum.as_ref()
    }

    /// Replaces the apex spectrum and refreshes the UID.
    pub fn set_mass_spectrum(&mut self, spectrum: MassSpectrum) {
        self.mass_spectrum = Some(spectrum);
        self.make_uid();
    }

    /// Point bounds `(left offset, apex scan, right offset)`.
    pub fn bounds(&self) -> Option<(usize, usize, usize)> {
        self.bounds
    }

    /// Sets the point bounds.
    pub fn set_bounds(&mut self, left: usize, apex: usize, right: usize) {
        self.bounds = Some((left, apex, right));
    }

    /// Total integrated area, once set by integration.
    pub fn area(&self) -> Option<f64> {
        self.area
    }

    /// Records the total integrated area.
    pub fn set_area(&mut self, area: f64) {
        self.area = Some(area);
    }

    /// Per-ion areas as (mass, area) pairs, sorted by mass.
    pub fn ion_areas(&self) -> &[(f64, f64)] {
        &self.ion_areas
    }

    /// Records the per-ion area map.
    pub fn set_ion_areas(&mut self, mut areas: Vec<(f64, f64)>) {
        areas.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.ion_areas = areas;
    }

    /// The area recorded for a single ion, if present.
    pub fn ion_area(&self, mass: f64) -> Option<f64> {
        self.ion_areas
            .iter()
            .find(|(m, _)| *m == mass)
            .map(|(_, a)| *a)
    }

    /// Whether the peak was flagged as a retention-time outlier.
    pub fn is_outlier(&self) -> bool {
        self.outlier
    }

    /// Sets the outlier flag.
    pub fn set_outlier(&mut self, outlier: bool) {
        self.outlier = outlier;
    }

    /// Intensity of the channel nearest to `mass` in the apex spectrum.
    pub fn int_of_ion(&self, mass: f64) -> Result<f64, PeakError> {
        let ms = self.mass_spectrum.as_ref().ok_or(PeakError::NoSpectrum)?;
        let (min, max) = match (ms.min_mass(), ms.max_mass()) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err(PeakError::NoSpectrum),
        };
        if mass < min || mass > max {
            return Err(PeakError::MassOutOfRange { mass, min, max });
        }
        let index = ms
            .nearest_mass_index(mass)
            .ok_or(PeakError::NoSpectrum)?;
        Ok(ms.intensities()[index])
    }

    /// The `n` masses with the highest apex intensities, most intense
    /// first.
    pub fn top_ions(&self, n: usize) -> Vec<f64> {
        let ms = match &self.mass_spectrum {
            Some(ms) => ms,
            None => return Vec::new(),
        };
        let mut order: Vec<usize> = (0..ms.len()).collect();
        order.sort_by_key(|&ii| std::cmp::Reverse(OrderedFloat(ms.intensities()[ii])));
        order
            .into_iter()
            .take(n)
            .map(|ii| ms.mass_list()[ii])
            .collect()
    }

    /// Crops the apex spectrum to `[mass_min, mass_max]` and refreshes the
    /// UID.
    pub fn crop_mass(&mut self, mass_min: f64, mass_max: f64) -> Result<(), PeakError> {
        let ms = self.mass_spectrum.as_mut().ok_or(PeakError::NoSpectrum)?;
        if mass_min >= mass_max {
            return Err(PeakError::InvalidMassRange {
                lo: mass_min,
                hi: mass_max,
            });
        }
        let (min, max) = match (ms.min_mass(), ms.max_mass()) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err(PeakError::EmptySpectrum),
        };
        if mass_min < min || mass_max > max {
            return Err(PeakError::InvalidMassRange {
                lo: mass_min,
                hi: mass_max,
            });
        }

        let remaining = ms.retain_mass_range(mass_min, mass_max);
        if remaining == 0 {
            return Err(PeakError::EmptySpectrum);
        }
        if remaining < 10 {
            warn!("peak mass spectrum contains fewer than 10 points after cropping");
        }
        self.make_uid();
        Ok(())
    }

    /// Zeroes the intensity of the channel nearest to `mass` and refreshes
    /// the UID.
    pub fn null_mass(&mut self, mass: f64) -> Result<(), PeakError> {
        let ms = self.mass_spectrum.as_mut().ok_or(PeakError::NoSpectrum)?;
        let (min, max) = match (ms.min_mass(), ms.max_mass()) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err(PeakError::EmptySpectrum),
        };
        if mass < min || mass > max {
            return Err(PeakError::MassOutOfRange { mass, min, max });
        }
        if let Some(index) = ms.nearest_mass_index(mass) {
            ms.zero_intensity_at(index);
        }
        self.make_uid();
        Ok(())
    }

    fn make_uid(&mut self) {
        self.uid = match &self.mass_spectrum {
            Some(ms) if ms.len() >= 2 => {
                let intensities = ms.intensities();
                let mut order: Vec<usize> = (0..ms.len()).collect();
                order.sort_by_key(|&ii| std::cmp::Reverse(OrderedFloat(intensities[ii])));
                let (first, second) = (order[0], order[1]);
                let (top, runner_up) = (intensities[first], intensities[second]);
                let ratio = if top > 0.0 {
                    (100.0 * runner_up / top) as i64
                } else {
                    -1
                };
                format!(
                    "{}-{}-{}-{:.2}",
                    ms.mass_list()[first] as i64,
                    ms.mass_list()[second] as i64,
                    ratio,
                    self.rt
                )
            }
            _ => format!("{:.2}", self.rt),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum() -> MassSpectrum {
        MassSpectrum::new(
            vec![50.0, 51.0, 52.0, 53.0],
            vec![10.0, 100.0, 0.0, 42.0],
        )
        .unwrap()
    }

    #[test]
    fn uid_from_top_two_masses() {
        let peak = Peak::with_spectrum(123.456, spectrum());
        // top: 51 (100), runner-up: 53 (42) -> ratio trunc(42) = 42
        assert_eq!(peak.uid(), "51-53-42-123.46");
    }

    #[test]
    fn uid_without_spectrum_is_the_rt() {
        let peak = Peak::new(61.5);
        assert_eq!(peak.uid(), "61.50");
    }

    #[test]
    fn uid_ratio_truncates() {
        let ms = MassSpectrum::new(vec![60.0, 61.0], vec![3.0, 2.0]).unwrap();
        let peak = Peak::with_spectrum(10.0, ms);
        // 100 * 2 / 3 = 66.66 -> 66
        assert_eq!(peak.uid(), "60-61-66-10.00");
    }

    #[test]
    fn crop_updates_uid() {
        let mut peak = Peak::with_spectrum(10.0, spectrum());
        peak.crop_mass(50.0, 52.0).unwrap();
        // 51 (100) and 50 (10) remain the strongest pair
        assert_eq!(peak.uid(), "51-50-10-10.00");
        assert!(peak.crop_mass(52.0, 50.0).is_err());
    }

    #[test]
    fn null_mass_updates_uid() {
        let mut peak = Peak::with_spectrum(10.0, spectrum());
        peak.null_mass(53.0).unwrap();
        assert_eq!(peak.uid(), "51-50-10-10.00");
        assert!(peak.null_mass(99.0).is_err());
    }

    #[test]
    fn top_ions_orders_by_intensity() {
        let peak = Peak::with_spectrum(10.0, spectrum());
        assert_eq!(peak.top_ions(3), vec![51.0, 53.0, 50.0]);
        assert_eq!(peak.top_ions(0), Vec::<f64>::new());
    }

    #[test]
    fn ion_area_lookup() {
        let mut peak = Peak::new(5.0);
        peak.set_ion_areas(vec![(73.0, 120.0), (51.0, 40.0)]);
        assert_eq!(peak.ion_area(51.0), Some(40.0));
        assert_eq!(peak.ion_area(99.0), None);
        assert_eq!(peak.ion_areas()[0].0, 51.0);
    }

    #[test]
    fn int_of_ion_uses_nearest_channel() {
        let peak = Peak::with_spectrum(10.0, spectrum());
        assert_eq!(peak.int_of_ion(51.2).unwrap(), 100.0);
        assert!(peak.int_of_ion(10.0).is_err());
    }
}
