//! Mass spectrum value type.

use serde::{Deserialize, Serialize};

/// Errors raised when constructing or mutating a [`MassSpectrum`].
#[derive(Debug, thiserror::Error)]
pub enum SpectrumError {
    /// Mass and intensity arrays differ in length.
    #[error("mass list has {masses} entries, intensity list has {intensities}")]
    LengthMismatch {
        masses: usize,
        intensities: usize,
    },
}

/// Intensities versus mass at a single scan.
///
/// The two arrays always have equal length; setters re-check the invariant.
/// Within an [`IntensityMatrix`](crate::matrix::IntensityMatrix) the mass
/// list is the shared, strictly increasing bin axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MassSpectrum {
    mass_list: Vec<f64>,
    intensities: Vec<f64>,
}

impl MassSpectrum {
    /// Creates a spectrum from parallel mass and intensity arrays.
    pub fn new(mass_list: Vec<f64>, intensities: Vec<f64>) -> Result<Self, SpectrumError> {
        if mass_list.len() != intensities.len() {
            return Err(SpectrumError::LengthMismatch {
                masses: mass_list.len(),
                intensities: intensities.len(),
            });
        }
        Ok(Self {
            mass_list,
            intensities,
        })
    }

    /// Number of mass channels.
    pub fn len(&self) -> usize {
        self.mass_list.len()
    }

    /// Whether the spectrum has no channels.
    pub fn is_empty(&self) -> bool {
        self.mass_list.is_empty()
    }

    /// The mass axis.
    pub fn mass_list(&self) -> &[f64] {
        &self.mass_list
    }

    /// The intensity values.
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Replaces the intensity values, preserving the length invariant.
    pub fn set_intensities(&mut self, intensities: Vec<f64>) -> Result<(), SpectrumError> {
        if intensities.len() != self.mass_list.len() {
            return Err(SpectrumError::LengthMismatch {
                masses: self.mass_list.len(),
                intensities: intensities.len(),
            });
        }
        self.intensities = intensities;
        Ok(())
    }

    /// Smallest mass on the axis, if any.
    pub fn min_mass(&self) -> Option<f64> {
        self.mass_list.first().copied()
    }

    /// Largest mass on the axis, if any.
    pub fn max_mass(&self) -> Option<f64> {
        self.mass_list.last().copied()
    }

    /// Index of the most intense channel, if any.
    pub fn base_peak_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (ii, &intensity) in self.intensities.iter().enumerate() {
            match best {
                Some((_, current)) if intensity <= current => {}
                _ => best = Some((ii, intensity)),
            }
        }
        best.map(|(ii, _)| ii)
    }

    /// Number of channels with intensity at or above `cutoff`.
    pub fn n_above(&self, cutoff: f64) -> usize {
        self.intensities.iter().filter(|&&v| v >= cutoff).count()
    }

    /// Retains only channels whose mass falls in `[mass_min, mass_max]`.
    /// Returns the number of surviving channels.
    pub(crate) fn retain_mass_range(&mut self, mass_min: f64, mass_max: f64) -> usize {
        let keep: Vec<bool> = self
            .mass_list
            .iter()
            .map(|&m| (mass_min..=mass_max).contains(&m))
            .collect();
        let mut keep_masses = keep.iter();
        self.mass_list.retain(|_| *keep_masses.next().unwrap_or(&false));
        let mut keep_ints = keep.iter();
        self.intensities.retain(|_| *keep_ints.next().unwrap_or(&false));
        self.mass_list.len()
    }

    /// Index of the channel whose mass is closest to `mass`.
    pub(crate) fn nearest_mass_index(&self, mass: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (ii, &m) in self.mass_list.iter().enumerate() {
            let dist = (m - mass).abs();
            match best {
                Some((_, current)) if dist >= current => {}
                _ => best = Some((ii, dist)),
            }
        }
        best.map(|(ii, _)| ii)
    }

    /// Zeroes the intensity of the channel at `index`.
    pub(crate) fn zero_intensity_at(&mut self, index: usize) {
        if let Some(value) = self.intensities.get_mut(index) {
            *value = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(MassSpectrum::new(vec![50.0, 51.0], vec![1.0]).is_err());
    }

    #[test]
    fn setters_preserve_lengths() {
        let mut ms = MassSpectrum::new(vec![50.0, 51.0], vec![1.0, 2.0]).unwrap();
        assert!(ms.set_intensities(vec![3.0]).is_err());
        ms.set_intensities(vec![3.0, 4.0]).unwrap();
        assert_eq!(ms.intensities(), &[3.0, 4.0]);
    }

    #[test]
    fn base_peak_and_counts() {
        let ms = MassSpectrum::new(vec![50.0, 51.0, 52.0], vec![5.0, 30.0, 10.0]).unwrap();
        assert_eq!(ms.base_peak_index(), Some(1));
        assert_eq!(ms.n_above(10.0), 2);
    }

    #[test]
    fn retain_range_drops_channels() {
        let mut ms =
            MassSpectrum::new(vec![50.0, 51.0, 52.0, 53.0], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(ms.retain_mass_range(51.0, 52.0), 2);
        assert_eq!(ms.mass_list(), &[51.0, 52.0]);
        assert_eq!(ms.intensities(), &[2.0, 3.0]);
    }

    #[test]
    fn nearest_mass_prefers_first_on_ties() {
        let ms = MassSpectrum::new(vec![50.0, 52.0], vec![0.0, 0.0]).unwrap();
        assert_eq!(ms.nearest_mass_index(51.0), Some(0));
        assert_eq!(ms.nearest_mass_index(51.9), Some(1));
    }
}
