//! Ion chromatogram value type.
//!
//! An ion chromatogram is a dense intensity trace indexed by scan, sharing
//! the retention-time axis of the data it was sliced from. The tag
//! distinguishes the total ion chromatogram, the base peak chromatogram,
//! single-ion traces and extracted (summed) ion traces; all variants read
//! the same way.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::math;

/// Errors raised by chromatogram construction and indexing.
#[derive(Debug, thiserror::Error)]
pub enum ChromatogramError {
    /// Intensity and time arrays differ in length.
    #[error("intensity array has {intensities} entries, time list has {times}")]
    LengthMismatch {
        intensities: usize,
        times: usize,
    },

    /// A scan index outside the trace.
    #[error("index {index} out of range for {len} scans")]
    IndexOutOfRange { index: usize, len: usize },

    /// A retention time outside the acquisition range.
    #[error("time {time:.3} s outside range {min:.3}..{max:.3} s")]
    TimeOutOfRange { time: f64, min: f64, max: f64 },

    /// I/O error while writing the trace to disk.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a chromatogram's intensities were summed over.
#[derive(Debug, Clone, PartialEq)]
pub enum ChromatogramKind {
    /// Total ion chromatogram: sum over all masses per scan.
    Tic,
    /// Base peak chromatogram: maximum over all masses per scan.
    BasePeak,
    /// A single mass channel.
    SingleIon {
        /// The tagged m/z value.
        mass: f64,
    },
    /// Sum over a subset of mass channels.
    ExtractedIon {
        /// The m/z values contributing to the trace.
        masses: Vec<f64>,
    },
}

/// Intensities as a function of retention time.
#[derive(Debug, Clone, PartialEq)]
pub struct IonChromatogram {
    intensities: Vec<f64>,
    times: Vec<f64>,
    kind: ChromatogramKind,
}

impl IonChromatogram {
    /// Creates a chromatogram, checking the length invariant.
    pub fn new(
        intensities: Vec<f64>,
        times: Vec<f64>,
        kind: ChromatogramKind,
    ) -> Result<Self, ChromatogramError> {
        if intensities.len() != times.len() {
            return Err(ChromatogramError::LengthMismatch {
                intensities: intensities.len(),
                times: times.len(),
            });
        }
        Ok(Self {
            intensities,
            times,
            kind,
        })
    }

    /// Number of scans in the trace.
    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    /// Whether the trace is empty.
    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    /// The intensity values.
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// The retention-time axis in seconds.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// The chromatogram tag.
    pub fn kind(&self) -> &ChromatogramKind {
        &self.kind
    }

    /// Whether this is a total ion chromatogram.
    pub fn is_tic(&self) -> bool {
        matches!(self.kind, ChromatogramKind::Tic)
    }

    /// The tagged m/z value for a single-ion trace.
    pub fn mass(&self) -> Option<f64> {
        match &self.kind {
            ChromatogramKind::SingleIon { mass } => Some(*mass),
            _ => None,
        }
    }

    /// Replaces the intensity values, preserving the length invariant.
    pub fn set_intensities(&mut self, intensities: Vec<f64>) -> Result<(), ChromatogramError> {
        if intensities.len() != self.times.len() {
            return Err(ChromatogramError::LengthMismatch {
                intensities: intensities.len(),
                times: self.times.len(),
            });
        }
        self.intensities = intensities;
        Ok(())
    }

    /// Mean time difference between consecutive scans.
    pub fn time_step(&self) -> f64 {
        if self.times.len() < 2 {
            return 0.0;
        }
        let diffs: Vec<f64> = self.times.windows(2).map(|w| w[1] - w[0]).collect();
        math::mean(&diffs)
    }

    /// Intensity at a scan index.
    pub fn intensity_at_index(&self, index: usize) -> Result<f64, ChromatogramError> {
        self.intensities
            .get(index)
            .copied()
            .ok_or(ChromatogramError::IndexOutOfRange {
                index,
                len: self.intensities.len(),
            })
    }

    /// Retention time at a scan index, in seconds.
    pub fn time_at_index(&self, index: usize) -> Result<f64, ChromatogramError> {
        self.times
            .get(index)
            .copied()
            .ok_or(ChromatogramError::IndexOutOfRange {
                index,
                len: self.times.len(),
            })
    }

    /// Index of the scan closest to the given retention time.
    pub fn index_at_time(&self, time: f64) -> Result<usize, ChromatogramError> {
        nearest_time_index(&self.times, time)
    }

    /// Writes the trace as two whitespace-separated columns (time,
    /// intensity), optionally with times converted to minutes.
    pub fn write<P: AsRef<Path>>(&self, path: P, minutes: bool) -> Result<(), ChromatogramError> {
        let mut out = BufWriter::new(File::create(path)?);
        for (time, intensity) in self.times.iter().zip(&self.intensities) {
            let t = if minutes { time / 60.0 } else { *time };
            writeln!(out, "{t:8.4} {intensity:.6e}")?;
        }
        Ok(())
    }
}

/// Index of the entry in a sorted time axis closest to `time`.
pub(crate) fn nearest_time_index(times: &[f64], time: f64) -> Result<usize, ChromatogramError> {
    let (first, last) = match (times.first(), times.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => {
            return Err(ChromatogramError::IndexOutOfRange { index: 0, len: 0 });
        }
    };
    if time < first || time > last {
        return Err(ChromatogramError::TimeOutOfRange {
            time,
            min: first,
            max: last,
        });
    }

    let mut best_index = 0;
    let mut best_dist = f64::INFINITY;
    for (ii, &t) in times.iter().enumerate() {
        let dist = (t - time).abs();
        if dist < best_dist {
            best_dist = dist;
            best_index = ii;
        }
    }
    Ok(best_index)
}
