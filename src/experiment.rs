//! Experiments: a peak list identified by a sample code.
//!
//! An experiment is the unit handed to the aligner: the peaks detected in
//! one GC-MS run, tagged with the code that will head its column in the
//! alignment output. Experiments round-trip through a small versioned JSON
//! document so that peak picking and alignment can run in separate
//! sessions.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::peak::Peak;
use crate::units::{time_str_secs, WindowError};

/// On-disk format version written by [`Experiment::store`].
const FORMAT_VERSION: u32 = 1;

/// Errors raised by experiment handling.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    /// An RT range whose lower bound is not below its upper bound.
    #[error("invalid RT range: {lo:.3} >= {hi:.3}")]
    InvalidRange { lo: f64, hi: f64 },

    /// A malformed time string in an RT range.
    #[error(transparent)]
    Window(#[from] WindowError),

    /// I/O failure while storing or loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An experiment file written by an incompatible version.
    #[error("unsupported experiment file version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Serialize, Deserialize)]
struct ExperimentFile {
    format_version: u32,
    code: String,
    peaks: Vec<Peak>,
}

/// A peak list scoped to one sample run.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    code: String,
    peaks: Vec<Peak>,
}

impl Experiment {
    /// Creates an experiment from its sample code and peak list.
    pub fn new(code: impl Into<String>, peaks: Vec<Peak>) -> Self {
        Self {
            code: code.into(),
            peaks,
        }
    }

    /// The sample code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The peaks, in detection order.
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Number of peaks.
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    /// Whether the experiment holds no peaks.
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// Discards peaks whose retention time falls outside `(lo, hi)`.
    ///
    /// Both bounds are time strings and the comparison is strict on both
    /// sides.
    pub fn sele_rt_range(&mut self, lo: &str, hi: &str) -> Result<(), ExperimentError> {
        let lo = time_str_secs(lo)?;
        let hi = time_str_secs(hi)?;
        if lo >= hi {
            return Err(ExperimentError::InvalidRange { lo, hi });
        }
        self.peaks.retain(|peak| lo < peak.rt() && peak.rt() < hi);
        Ok(())
    }

    /// Writes the experiment as a versioned JSON document.
    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<(), ExperimentError> {
        let file = ExperimentFile {
            format_version: FORMAT_VERSION,
            code: self.code.clone(),
            peaks: self.peaks.clone(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &file)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads an experiment stored by [`Experiment::store`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ExperimentError> {
        let reader = BufReader::new(File::open(path)?);
        let file: ExperimentFile = serde_json::from_reader(reader)?;
        if file.format_version != FORMAT_VERSION {
            return Err(ExperimentError::UnsupportedVersion(file.format_version));
        }
        Ok(Self {
            code: file.code,
            peaks: file.peaks,
        })
    }
}

/// Loads the experiments named in a listing file, one path per line.
///
/// Relative paths resolve against the listing file's directory. Blank
/// lines are skipped.
pub fn read_expr_list<P: AsRef<Path>>(path: P) -> Result<Vec<Experiment>, ExperimentError> {
    let path = path.as_ref();
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let reader = BufReader::new(File::open(path)?);

    let mut experiments = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry = Path::new(trimmed);
        let resolved = if entry.is_absolute() {
            entry.to_path_buf()
        } else {
            base.join(entry)
        };
        experiments.push(Experiment::load(&resolved)?);
    }
    info!("loaded {} experiment(s) from {}", experiments.len(), path.display());
    Ok(experiments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::MassSpectrum;
    use std::io::Write;

    fn peak_at(rt: f64) -> Peak {
        let ms = MassSpectrum::new(vec![50.0, 51.0], vec![10.0, 20.0]).unwrap();
        Peak::with_spectrum(rt, ms)
    }

    #[test]
    fn rt_selection_is_strict() {
        let mut expr = Experiment::new(
            "wt-01",
            vec![peak_at(60.0), peak_at(90.0), peak_at(120.0)],
        );
        expr.sele_rt_range("1m", "2m").unwrap();
        assert_eq!(expr.len(), 1);
        assert_eq!(expr.peaks()[0].rt(), 90.0);
    }

    #[test]
    fn rt_selection_rejects_inverted_ranges() {
        let mut expr = Experiment::new("wt-01", vec![peak_at(60.0)]);
        assert!(matches!(
            expr.sele_rt_range("2m", "1m"),
            Err(ExperimentError::InvalidRange { .. })
        ));
        assert!(expr.sele_rt_range("2x", "3m").is_err());
    }

    #[test]
    fn store_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wt-01.json");

        let mut peak = peak_at(60.0);
        peak.set_area(1234.5);
        peak.set_ion_areas(vec![(51.0, 1000.0), (50.0, 234.5)]);
        let expr = Experiment::new("wt-01", vec![peak, peak_at(90.0)]);

        expr.store(&path).unwrap();
        let loaded = Experiment::load(&path).unwrap();
        assert_eq!(loaded, expr);
        assert_eq!(loaded.peaks()[0].uid(), expr.peaks()[0].uid());
    }

    #[test]
    fn listing_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        Experiment::new("a", vec![peak_at(1.0)])
            .store(dir.path().join("a.json"))
            .unwrap();
        Experiment::new("b", vec![peak_at(2.0)])
            .store(dir.path().join("b.json"))
            .unwrap();

        let listing = dir.path().join("all.txt");
        let mut f = File::create(&listing).unwrap();
        writeln!(f, "a.json\n\nb.json").unwrap();

        let exprs = read_expr_list(&listing).unwrap();
        assert_eq!(exprs.len(), 2);
        assert_eq!(exprs[1].code(), "b");
    }
}
