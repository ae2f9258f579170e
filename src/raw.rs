//! Raw GC-MS data: scans and the run that contains them.
//!
//! A [`Scan`] is the sparse (m/z, intensity) list acquired at one retention
//! time; [`RawData`] pairs the strictly increasing retention-time vector
//! with its scans. Raw data is constructed once by a parser and never
//! mutated afterwards; trimming produces a new object.

use log::info;

use crate::chromatogram::{nearest_time_index, ChromatogramError, ChromatogramKind, IonChromatogram};
use crate::math;
use crate::units::{time_str_secs, WindowError};

/// Errors raised when assembling raw data.
#[derive(Debug, thiserror::Error)]
pub enum RawDataError {
    /// No scans were supplied.
    #[error("raw data must contain at least one scan")]
    Empty,

    /// Time and scan lists differ in length.
    #[error("{times} retention times do not match {scans} scans")]
    LengthMismatch { times: usize, scans: usize },

    /// A scan's mass and intensity arrays differ in length.
    #[error("scan {index}: {masses} masses do not match {intensities} intensities")]
    ScanLengthMismatch {
        index: usize,
        masses: usize,
        intensities: usize,
    },

    /// Retention times are not strictly increasing.
    #[error("retention times not strictly increasing at scan {index}")]
    TimesNotIncreasing { index: usize },

    /// A scan's masses are not sorted ascending.
    #[error("scan {index}: masses not sorted ascending")]
    UnsortedMasses { index: usize },

    /// A negative intensity value.
    #[error("scan {index}: negative intensity")]
    NegativeIntensity { index: usize },

    /// A time-range selection was malformed.
    #[error(transparent)]
    Window(#[from] WindowError),

    /// A trim range selected no scans.
    #[error("trim range selects no scans")]
    EmptyRange,
}

/// One mass-spectrometer acquisition: sorted (mass, intensity) pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    masses: Vec<f64>,
    intensities: Vec<f64>,
}

impl Scan {
    /// Creates a scan from parallel mass and intensity arrays.
    ///
    /// Masses must be sorted ascending and intensities non-negative; the
    /// arrays may be empty (an acquisition with no ions above threshold).
    pub fn new(masses: Vec<f64>, intensities: Vec<f64>) -> Result<Self, RawDataError> {
        Self::validated(masses, intensities, 0)
    }

    fn validated(
        masses: Vec<f64>,
        intensities: Vec<f64>,
        index: usize,
    ) -> Result<Self, RawDataError> {
        if masses.len() != intensities.len() {
            return Err(RawDataError::ScanLengthMismatch {
                index,
                masses: masses.len(),
                intensities: intensities.len(),
            });
        }
        if masses.windows(2).any(|w| w[1] < w[0]) {
            return Err(RawDataError::UnsortedMasses { index });
        }
        if intensities.iter().any(|&v| v < 0.0) {
            return Err(RawDataError::NegativeIntensity { index });
        }
        Ok(Self {
            masses,
            intensities,
        })
    }

    /// Number of (mass, intensity) pairs.
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    /// Whether the scan recorded no ions.
    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    /// The mass values, ascending.
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    /// The intensity values.
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Smallest mass in the scan.
    pub fn min_mass(&self) -> Option<f64> {
        self.masses.first().copied()
    }

    /// Largest mass in the scan.
    pub fn max_mass(&self) -> Option<f64> {
        self.masses.last().copied()
    }

    /// Sum of all intensities in the scan.
    pub fn total_intensity(&self) -> f64 {
        self.intensities.iter().sum()
    }
}

/// A complete run: retention times plus one scan per time point.
#[derive(Debug, Clone, PartialEq)]
pub struct RawData {
    times: Vec<f64>,
    scans: Vec<Scan>,
    time_step: f64,
    time_step_std: f64,
    min_mass: f64,
    max_mass: f64,
}

impl RawData {
    /// Assembles a run from retention times (seconds) and scans.
    pub fn new(times: Vec<f64>, scans: Vec<Scan>) -> Result<Self, RawDataError> {
        if times.is_empty() || scans.is_empty() {
            return Err(RawDataError::Empty);
        }
        if times.len() != scans.len() {
            return Err(RawDataError::LengthMismatch {
                times: times.len(),
                scans: scans.len(),
            });
        }
        for (index, w) in times.windows(2).enumerate() {
            if w[1] <= w[0] {
                return Err(RawDataError::TimesNotIncreasing { index: index + 1 });
            }
        }

        let diffs: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
        let time_step = math::mean(&diffs);
        let time_step_std = math::std_dev(&diffs);

        let mut min_mass = f64::INFINITY;
        let mut max_mass = f64::NEG_INFINITY;
        for scan in &scans {
            if let Some(m) = scan.min_mass() {
                min_mass = min_mass.min(m);
            }
            if let Some(m) = scan.max_mass() {
                max_mass = max_mass.max(m);
            }
        }
        if !min_mass.is_finite() || !max_mass.is_finite() {
            return Err(RawDataError::Empty);
        }

        Ok(Self {
            times,
            scans,
            time_step,
            time_step_std,
            min_mass,
            max_mass,
        })
    }

    /// Number of scans.
    pub fn len(&self) -> usize {
        self.scans.len()
    }

    /// Whether the run holds no scans. Always false for constructed data.
    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// Retention times in seconds, strictly increasing.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// The scans, one per retention time.
    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }

    /// The scan at `index`, if in range.
    pub fn scan(&self, index: usize) -> Option<&Scan> {
        self.scans.get(index)
    }

    /// Smallest mass over all scans.
    pub fn min_mass(&self) -> f64 {
        self.min_mass
    }

    /// Largest mass over all scans.
    pub fn max_mass(&self) -> f64 {
        self.max_mass
    }

    /// Mean time difference between consecutive scans.
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Standard deviation of the time differences.
    pub fn time_step_std(&self) -> f64 {
        self.time_step_std
    }

    /// Index of the scan closest to the given retention time.
    pub fn index_at_time(&self, time: f64) -> Result<usize, ChromatogramError> {
        nearest_time_index(&self.times, time)
    }

    /// The total ion chromatogram: summed intensity per scan.
    pub fn tic(&self) -> IonChromatogram {
        let intensities: Vec<f64> = self.scans.iter().map(Scan::total_intensity).collect();
        // lengths match by construction
        IonChromatogram::new(intensities, self.times.clone(), ChromatogramKind::Tic)
            .unwrap_or_else(|_| unreachable!("times and scans have equal length"))
    }

    /// Returns a new run restricted to the scans whose retention time lies
    /// between the two time strings (inclusive of nearest scans).
    pub fn trim_time(&self, begin: &str, end: &str) -> Result<RawData, RawDataError> {
        let lo = time_str_secs(begin)?;
        let hi = time_str_secs(end)?;
        let first = self
            .times
            .iter()
            .position(|&t| t >= lo)
            .ok_or(RawDataError::EmptyRange)?;
        let last = match self.times.iter().rposition(|&t| t <= hi) {
            Some(last) if last >= first => last,
            _ => return Err(RawDataError::EmptyRange),
        };
        self.trim_scans(first, last)
    }

    /// Returns a new run holding scans `first..=last`.
    pub fn trim_scans(&self, first: usize, last: usize) -> Result<RawData, RawDataError> {
        if first > last || last >= self.scans.len() {
            return Err(RawDataError::EmptyRange);
        }
        RawData::new(
            self.times[first..=last].to_vec(),
            self.scans[first..=last].to_vec(),
        )
    }

    /// Logs a summary of the run.
    pub fn info(&self) {
        info!(
            "raw data: {} scans, RT {:.3}..{:.3} s, time step {:.4} s (std {:.4}), mass {:.1}..{:.1}",
            self.len(),
            self.times[0],
            self.times[self.times.len() - 1],
            self.time_step,
            self.time_step_std,
            self.min_mass,
            self.max_mass,
        );
    }
}

/// Builds scans from flat (mass, intensity) pair streams, used by parsers.
pub(crate) fn scan_from_pairs(
    pairs: &[f64],
    index: usize,
) -> Result<Scan, RawDataError> {
    debug_assert_eq!(pairs.len() % 2, 0);
    let mut points: Vec<(f64, f64)> = pairs
        .chunks_exact(2)
        .map(|c| (c[0], c[1]))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    let masses: Vec<f64> = points.iter().map(|p| p.0).collect();
    let intensities: Vec<f64> = points.iter().map(|p| p.1.max(0.0)).collect();
    Scan::validated(masses, intensities, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RawData {
        let scans = vec![
            Scan::new(vec![50.0, 51.0], vec![10.0, 20.0]).unwrap(),
            Scan::new(vec![50.0, 52.0], vec![5.0, 30.0]).unwrap(),
            Scan::new(vec![51.0, 52.0], vec![15.0, 25.0]).unwrap(),
        ];
        RawData::new(vec![0.0, 1.0, 2.0], scans).unwrap()
    }

    #[test]
    fn non_increasing_times_are_rejected() {
        let scans = vec![
            Scan::new(vec![50.0], vec![1.0]).unwrap(),
            Scan::new(vec![50.0], vec![1.0]).unwrap(),
        ];
        assert!(matches!(
            RawData::new(vec![1.0, 1.0], scans),
            Err(RawDataError::TimesNotIncreasing { index: 1 })
        ));
    }

    #[test]
    fn unsorted_masses_are_rejected() {
        assert!(matches!(
            Scan::new(vec![51.0, 50.0], vec![1.0, 1.0]),
            Err(RawDataError::UnsortedMasses { .. })
        ));
    }

    #[test]
    fn global_mass_range_spans_all_scans() {
        let data = run();
        assert_eq!(data.min_mass(), 50.0);
        assert_eq!(data.max_mass(), 52.0);
    }

    #[test]
    fn tic_sums_each_scan() {
        let tic = run().tic();
        assert_eq!(tic.intensities(), &[30.0, 35.0, 40.0]);
        assert!(tic.is_tic());
    }

    #[test]
    fn time_step_statistics() {
        let data = run();
        assert!((data.time_step() - 1.0).abs() < 1e-12);
        assert!(data.time_step_std() < 1e-12);
    }

    #[test]
    fn trim_by_time_string() {
        let data = run();
        let trimmed = data.trim_time("1s", "2s").unwrap();
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed.times(), &[1.0, 2.0]);
        assert!(data.trim_time("9s", "10s").is_err());
    }

    #[test]
    fn pair_stream_is_sorted_into_a_scan() {
        let scan = scan_from_pairs(&[52.0, 3.0, 50.0, 1.0], 0).unwrap();
        assert_eq!(scan.masses(), &[50.0, 52.0]);
        assert_eq!(scan.intensities(), &[1.0, 3.0]);
    }
}
