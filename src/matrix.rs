//! Binned intensity matrix.
//!
//! Raw scans have irregular, sparse mass axes; the intensity matrix bins
//! them onto a dense scan x mass grid so that per-ion chromatograms
//! (columns) and mass spectra (rows) can be sliced out. Two binning modes
//! are provided: flexible float bins centred on `min_mass + k * interval`,
//! and unit bins centred on integer masses.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::chromatogram::{
    nearest_time_index, ChromatogramError, ChromatogramKind, IonChromatogram,
};
use crate::raw::RawData;
use crate::spectrum::{MassSpectrum, SpectrumError};

/// Errors raised by matrix construction and slicing.
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    /// `bin_interval <= 0`.
    #[error("bin interval must be larger than zero, got {0}")]
    NonPositiveBinInterval(f64),

    /// Bin half-widths do not fill the interval.
    #[error(
        "there should be no gaps or overlap between bins: \
         left {left} + right {right} != interval {interval}"
    )]
    InvalidBinning {
        left: f64,
        right: f64,
        interval: f64,
    },

    /// A row or column index outside the matrix.
    #[error("{axis} index {index} out of range ({len})")]
    IndexOutOfRange {
        axis: &'static str,
        index: usize,
        len: usize,
    },

    /// A mass outside the binned range.
    #[error("mass {mass:.3} outside range {min:.3} to {max:.3}")]
    MassOutOfRange { mass: f64, min: f64, max: f64 },

    /// A mass range with `lo >= hi` or outside the binned axis.
    #[error("invalid mass range {lo:.3}..{hi:.3}")]
    InvalidMassRange { lo: f64, hi: f64 },

    /// A mass range that selects no bins.
    #[error("mass range {lo:.3}..{hi:.3} selects no bins")]
    EmptyCrop { lo: f64, hi: f64 },

    /// An array whose length disagrees with the matrix shape.
    #[error("matrix is {rows} x {cols} but {what} has length {len}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        what: &'static str,
        len: usize,
    },

    /// Axis vectors inconsistent with the intensity array.
    #[error("mass list must be strictly increasing")]
    UnsortedMassList,

    #[error(transparent)]
    Chromatogram(#[from] ChromatogramError),

    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    /// I/O error during export.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Dense scan x mass intensity matrix with its two axis vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityMatrix {
    intensities: Array2<f64>,
    times: Vec<f64>,
    masses: Vec<f64>,
}

impl IntensityMatrix {
    /// Creates a matrix from its axis vectors and intensity array.
    ///
    /// Rows are scans, columns are mass bins. The mass list must be
    /// strictly increasing.
    pub fn new(
        times: Vec<f64>,
        masses: Vec<f64>,
        intensities: Array2<f64>,
    ) -> Result<Self, MatrixError> {
        let (rows, cols) = intensities.dim();
        if times.len() != rows {
            return Err(MatrixError::ShapeMismatch {
                rows,
                cols,
                what: "time list",
                len: times.len(),
            });
        }
        if masses.len() != cols {
            return Err(MatrixError::ShapeMismatch {
                rows,
                cols,
                what: "mass list",
                len: masses.len(),
            });
        }
        if masses.windows(2).any(|w| w[1] <= w[0]) {
            return Err(MatrixError::UnsortedMassList);
        }
        Ok(Self {
            intensities,
            times,
            masses,
        })
    }

    /// Number of rows (scans) and columns (mass bins).
    pub fn size(&self) -> (usize, usize) {
        self.intensities.dim()
    }

    /// The retention-time axis.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// The binned mass axis, strictly increasing.
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    /// The raw intensity array.
    pub fn intensity_array(&self) -> &Array2<f64> {
        &self.intensities
    }

    /// Smallest binned mass.
    pub fn min_mass(&self) -> f64 {
        self.masses.first().copied().unwrap_or(f64::NAN)
    }

    /// Largest binned mass.
    pub fn max_mass(&self) -> f64 {
        self.masses.last().copied().unwrap_or(f64::NAN)
    }

    /// The total ion chromatogram: row sums.
    pub fn tic(&self) -> IonChromatogram {
        let sums: Vec<f64> = self
            .intensities
            .axis_iter(Axis(0))
            .map(|row| row.sum())
            .collect();
        IonChromatogram::new(sums, self.times.clone(), ChromatogramKind::Tic)
            .unwrap_or_else(|_| unreachable!("row count equals time count"))
    }

    /// The base peak chromatogram: row maxima.
    pub fn bpc(&self) -> IonChromatogram {
        let maxima: Vec<f64> = self
            .intensities
            .axis_iter(Axis(0))
            .map(|row| row.iter().copied().fold(0.0_f64, f64::max))
            .collect();
        IonChromatogram::new(maxima, self.times.clone(), ChromatogramKind::BasePeak)
            .unwrap_or_else(|_| unreachable!("row count equals time count"))
    }

    fn column_intensities(&self, index: usize) -> Vec<f64> {
        self.intensities.column(index).to_vec()
    }

    /// The ion chromatogram for the mass bin at `index`.
    pub fn ic_at_index(&self, index: usize) -> Result<IonChromatogram, MatrixError> {
        let mass = self.mass_at_index(index)?;
        Ok(IonChromatogram::new(
            self.column_intensities(index),
            self.times.clone(),
            ChromatogramKind::SingleIon { mass },
        )?)
    }

    /// The ion chromatogram for the bin nearest `mass`, or the TIC when
    /// `mass` is `None`.
    pub fn ic_at_mass(&self, mass: Option<f64>) -> Result<IonChromatogram, MatrixError> {
        match mass {
            None => Ok(self.tic()),
            Some(m) => {
                if m < self.min_mass() || m > self.max_mass() {
                    return Err(MatrixError::MassOutOfRange {
                        mass: m,
                        min: self.min_mass(),
                        max: self.max_mass(),
                    });
                }
                self.ic_at_index(self.index_of_mass(m))
            }
        }
    }

    /// An extracted ion chromatogram summing the bins nearest each of the
    /// given masses.
    pub fn eic(&self, masses: &[f64]) -> Result<IonChromatogram, MatrixError> {
        let rows = self.times.len();
        let mut sums = vec![0.0; rows];
        for &m in masses {
            if m < self.min_mass() || m > self.max_mass() {
                return Err(MatrixError::MassOutOfRange {
                    mass: m,
                    min: self.min_mass(),
                    max: self.max_mass(),
                });
            }
            let col = self.intensities.column(self.index_of_mass(m));
            for (sum, v) in sums.iter_mut().zip(col.iter()) {
                *sum += *v;
            }
        }
        Ok(IonChromatogram::new(
            sums,
            self.times.clone(),
            ChromatogramKind::ExtractedIon {
                masses: masses.to_vec(),
            },
        )?)
    }

    /// The mass spectrum of the scan at `index`.
    pub fn ms_at_index(&self, index: usize) -> Result<MassSpectrum, MatrixError> {
        Ok(MassSpectrum::new(
            self.masses.clone(),
            self.scan_at_index(index)?,
        )?)
    }

    /// The intensity row of the scan at `index`.
    pub fn scan_at_index(&self, index: usize) -> Result<Vec<f64>, MatrixError> {
        if index >= self.times.len() {
            return Err(MatrixError::IndexOutOfRange {
                axis: "scan",
                index,
                len: self.times.len(),
            });
        }
        Ok(self.intensities.row(index).to_vec())
    }

    /// The binned mass at a column index.
    pub fn mass_at_index(&self, index: usize) -> Result<f64, MatrixError> {
        self.masses
            .get(index)
            .copied()
            .ok_or(MatrixError::IndexOutOfRange {
                axis: "mass",
                index,
                len: self.masses.len(),
            })
    }

    /// The column index of the bin nearest to `mass`.
    pub fn index_of_mass(&self, mass: f64) -> usize {
        let mut best_index = 0;
        let mut best_dist = f64::INFINITY;
        for (ii, &m) in self.masses.iter().enumerate() {
            let dist = (m - mass).abs();
            if dist < best_dist {
                best_dist = dist;
                best_index = ii;
            }
        }
        best_index
    }

    /// The row index of the scan closest to the given retention time.
    pub fn index_at_time(&self, time: f64) -> Result<usize, MatrixError> {
        Ok(nearest_time_index(&self.times, time)?)
    }

    /// The retention time of the scan at `index`.
    pub fn time_at_index(&self, index: usize) -> Result<f64, MatrixError> {
        self.times
            .get(index)
            .copied()
            .ok_or(MatrixError::IndexOutOfRange {
                axis: "scan",
                index,
                len: self.times.len(),
            })
    }

    /// Mean time difference between consecutive scans.
    pub fn time_step(&self) -> f64 {
        if self.times.len() < 2 {
            return 0.0;
        }
        let diffs: Vec<f64> = self.times.windows(2).map(|w| w[1] - w[0]).collect();
        crate::math::mean(&diffs)
    }

    /// Overwrites the column at `index` with the intensities of `ic`.
    pub fn set_ic_at_index(
        &mut self,
        index: usize,
        ic: &IonChromatogram,
    ) -> Result<(), MatrixError> {
        let (rows, cols) = self.size();
        if index >= cols {
            return Err(MatrixError::IndexOutOfRange {
                axis: "mass",
                index,
                len: cols,
            });
        }
        if ic.len() != rows {
            return Err(MatrixError::ShapeMismatch {
                rows,
                cols,
                what: "ion chromatogram",
                len: ic.len(),
            });
        }
        for (cell, v) in self
            .intensities
            .column_mut(index)
            .iter_mut()
            .zip(ic.intensities())
        {
            *cell = *v;
        }
        Ok(())
    }

    /// Deletes all columns whose mass lies outside `[mass_min, mass_max]`.
    pub fn crop_mass(&mut self, mass_min: f64, mass_max: f64) -> Result<(), MatrixError> {
        if mass_min >= mass_max {
            return Err(MatrixError::InvalidMassRange {
                lo: mass_min,
                hi: mass_max,
            });
        }
        if mass_min < self.min_mass() || mass_max > self.max_mass() {
            return Err(MatrixError::InvalidMassRange {
                lo: mass_min,
                hi: mass_max,
            });
        }

        let keep: Vec<usize> = self
            .masses
            .iter()
            .enumerate()
            .filter(|(_, &m)| (mass_min..=mass_max).contains(&m))
            .map(|(ii, _)| ii)
            .collect();
        if keep.is_empty() {
            return Err(MatrixError::EmptyCrop {
                lo: mass_min,
                hi: mass_max,
            });
        }

        self.intensities = self.intensities.select(Axis(1), &keep);
        self.masses = keep.iter().map(|&ii| self.masses[ii]).collect();
        Ok(())
    }

    /// Zeroes the column of the bin nearest to `mass`.
    pub fn null_mass(&mut self, mass: f64) -> Result<(), MatrixError> {
        if mass < self.min_mass() || mass > self.max_mass() {
            return Err(MatrixError::MassOutOfRange {
                mass,
                min: self.min_mass(),
                max: self.max_mass(),
            });
        }
        let index = self.index_of_mass(mass);
        self.intensities.column_mut(index).fill(0.0);
        Ok(())
    }

    /// Builds a new matrix over the bins nearest each of the given masses.
    pub fn extract_masses(&self, masses: &[f64]) -> Result<IntensityMatrix, MatrixError> {
        let mut indices: Vec<usize> = Vec::with_capacity(masses.len());
        for &m in masses {
            if m < self.min_mass() || m > self.max_mass() {
                return Err(MatrixError::MassOutOfRange {
                    mass: m,
                    min: self.min_mass(),
                    max: self.max_mass(),
                });
            }
            indices.push(self.index_of_mass(m));
        }
        indices.sort_unstable();
        indices.dedup();
        if indices.is_empty() {
            return Err(MatrixError::EmptyCrop {
                lo: f64::NAN,
                hi: f64::NAN,
            });
        }

        IntensityMatrix::new(
            self.times.clone(),
            indices.iter().map(|&ii| self.masses[ii]).collect(),
            self.intensities.select(Axis(1), &indices),
        )
    }

    /// Keeps only the `n` most intense channels of every scan, zeroing the
    /// rest.
    pub fn reduce_mass_spectra(&mut self, n: usize) {
        for mut row in self.intensities.axis_iter_mut(Axis(0)) {
            let mut order: Vec<usize> = (0..row.len()).collect();
            order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
            for &ii in order.iter().skip(n) {
                row[ii] = 0.0;
            }
        }
    }

    /// Applies a per-column transformation, producing a new matrix.
    ///
    /// Columns are processed in parallel; the transformation must preserve
    /// the trace length.
    pub fn map_columns<E, F>(&self, f: F) -> Result<IntensityMatrix, E>
    where
        F: Fn(&IonChromatogram) -> Result<IonChromatogram, E> + Sync,
        E: Send,
    {
        let (rows, cols) = self.size();
        let columns: Vec<Vec<f64>> = (0..cols)
            .into_par_iter()
            .map(|ix| {
                let ic = IonChromatogram::new(
                    self.column_intensities(ix),
                    self.times.clone(),
                    ChromatogramKind::SingleIon {
                        mass: self.masses[ix],
                    },
                )
                .unwrap_or_else(|_| unreachable!("column length equals time count"));
                f(&ic).map(|out| out.intensities().to_vec())
            })
            .collect::<Result<Vec<_>, E>>()?;

        let mut intensities = Array2::zeros((rows, cols));
        for (ix, column) in columns.iter().enumerate() {
            for (rr, v) in column.iter().enumerate() {
                intensities[[rr, ix]] = *v;
            }
        }
        Ok(Self {
            intensities,
            times: self.times.clone(),
            masses: self.masses.clone(),
        })
    }

    /// Exports the matrix and its axis vectors as `<root>.im.csv`,
    /// `<root>.mz.csv` and `<root>.rt.csv` (comma separated) or `.dat`
    /// (space separated).
    pub fn export_ascii<P: AsRef<Path>>(
        &self,
        root: P,
        format: AsciiFormat,
    ) -> Result<(), MatrixError> {
        let root = root.as_ref();
        let (sep, ext) = match format {
            AsciiFormat::Csv => (',', "csv"),
            AsciiFormat::Dat => (' ', "dat"),
        };

        let path_of = |stem: &str| {
            let mut name = root.as_os_str().to_os_string();
            name.push(format!(".{stem}.{ext}"));
            std::path::PathBuf::from(name)
        };

        let mut im = BufWriter::new(File::create(path_of("im"))?);
        for row in self.intensities.axis_iter(Axis(0)) {
            let line: Vec<String> = row.iter().map(|v| format!("{v:.6e}")).collect();
            writeln!(im, "{}", line.join(&sep.to_string()))?;
        }

        let mut mz = BufWriter::new(File::create(path_of("mz"))?);
        for mass in &self.masses {
            writeln!(mz, "{mass}")?;
        }

        let mut rt = BufWriter::new(File::create(path_of("rt"))?);
        for time in &self.times {
            writeln!(rt, "{time:.6e}")?;
        }
        Ok(())
    }
}

/// Output flavour for [`IntensityMatrix::export_ascii`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsciiFormat {
    /// Comma-separated values.
    Csv,
    /// Space-separated values.
    Dat,
}

/// Builds an intensity matrix with flexible float bins.
///
/// Bin `k` is centred on `min_mass + k * bin_interval`; the half-widths
/// `bin_left` and `bin_right` must fill the interval. A raw mass `m`
/// contributes to bin `floor((m + frac(bin_left) - min_mass) / interval)`.
/// When `min_mass` is `None` the data minimum is used.
pub fn build_intensity_matrix(
    data: &RawData,
    bin_interval: f64,
    bin_left: f64,
    bin_right: f64,
    min_mass: Option<f64>,
) -> Result<IntensityMatrix, MatrixError> {
    if bin_interval <= 0.0 {
        return Err(MatrixError::NonPositiveBinInterval(bin_interval));
    }
    if (bin_left + bin_right - bin_interval).abs() >= 1.0e-6 * bin_interval {
        return Err(MatrixError::InvalidBinning {
            left: bin_left,
            right: bin_right,
            interval: bin_interval,
        });
    }

    let min_mass = min_mass.unwrap_or_else(|| data.min_mass());
    fill_bins(data, min_mass, data.max_mass(), bin_interval, bin_left.abs())
}

/// Builds an intensity matrix with unit bins centred on integer masses.
///
/// Uses half-widths 0.3/0.7 so that, for example, a raw mass of 73.29
/// falls in the bin centred at 73 while 73.31 falls in the bin centred
/// at 74.
pub fn build_intensity_matrix_i(data: &RawData) -> Result<IntensityMatrix, MatrixError> {
    let (bin_left, bin_right) = (0.3, 0.7);
    let min_mass = (data.min_mass() + 1.0 - bin_right).trunc();
    fill_bins(data, min_mass, data.max_mass(), 1.0, bin_left)
}

fn fill_bins(
    data: &RawData,
    min_mass: f64,
    max_mass: f64,
    bin_interval: f64,
    bin_left: f64,
) -> Result<IntensityMatrix, MatrixError> {
    // only the fractional part of the left boundary shifts the bin index
    let bl = bin_left - bin_left.floor();

    let num_bins = ((max_mass + bl - min_mass) / bin_interval) as usize + 1;
    let mass_list: Vec<f64> = (0..num_bins)
        .map(|ii| min_mass + ii as f64 * bin_interval)
        .collect();

    let mut intensities = Array2::zeros((data.len(), num_bins));
    for (row, scan) in data.scans().iter().enumerate() {
        for (&mass, &intensity) in scan.masses().iter().zip(scan.intensities()) {
            let mm = ((mass + bl - min_mass) / bin_interval).floor();
            if mm >= 0.0 && (mm as usize) < num_bins {
                intensities[[row, mm as usize]] += intensity;
            }
        }
    }

    IntensityMatrix::new(data.times().to_vec(), mass_list, intensities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::Scan;

    fn three_scan_run() -> RawData {
        let scans = vec![
            Scan::new(vec![50.0, 51.0], vec![10.0, 20.0]).unwrap(),
            Scan::new(vec![50.0, 52.0], vec![5.0, 30.0]).unwrap(),
            Scan::new(vec![51.0, 52.0], vec![15.0, 25.0]).unwrap(),
        ];
        RawData::new(vec![0.0, 1.0, 2.0], scans).unwrap()
    }

    #[test]
    fn integer_binning_matches_expected_grid() {
        let im = build_intensity_matrix_i(&three_scan_run()).unwrap();
        assert_eq!(im.masses(), &[50.0, 51.0, 52.0]);
        let expected = ndarray::arr2(&[
            [10.0, 20.0, 0.0],
            [5.0, 0.0, 30.0],
            [0.0, 15.0, 25.0],
        ]);
        assert_eq!(im.intensity_array(), &expected);
    }

    #[test]
    fn integer_binning_keeps_integral_masses_centred() {
        // 73.0 must land in the bin centred at 73 with 0.3/0.7 boundaries
        let scans = vec![Scan::new(vec![73.0], vec![1.0]).unwrap()];
        let data = RawData::new(vec![0.0], scans);
        // a single scan is enough for binning even without a time step
        let data = data.unwrap();
        let im = build_intensity_matrix_i(&data).unwrap();
        let col = im.index_of_mass(73.0);
        assert_eq!(im.masses()[col], 73.0);
        assert_eq!(im.intensity_array()[[0, col]], 1.0);
    }

    #[test]
    fn inconsistent_bin_widths_are_rejected() {
        let data = three_scan_run();
        assert!(matches!(
            build_intensity_matrix(&data, 1.0, 0.4, 0.7, None),
            Err(MatrixError::InvalidBinning { .. })
        ));
        assert!(matches!(
            build_intensity_matrix(&data, 0.0, 0.0, 0.0, None),
            Err(MatrixError::NonPositiveBinInterval(_))
        ));
    }

    #[test]
    fn binning_conserves_total_intensity() {
        let data = three_scan_run();
        let im = build_intensity_matrix(&data, 1.0, 0.5, 0.5, None).unwrap();
        let raw_total: f64 = data.scans().iter().map(|s| s.total_intensity()).sum();
        assert!((im.intensity_array().sum() - raw_total).abs() < 1e-9);
    }

    #[test]
    fn tic_and_bpc() {
        let im = build_intensity_matrix_i(&three_scan_run()).unwrap();
        assert_eq!(im.tic().intensities(), &[30.0, 35.0, 40.0]);
        assert_eq!(im.bpc().intensities(), &[20.0, 30.0, 25.0]);
    }

    #[test]
    fn slicing_views() {
        let im = build_intensity_matrix_i(&three_scan_run()).unwrap();
        let ic = im.ic_at_mass(Some(51.0)).unwrap();
        assert_eq!(ic.intensities(), &[20.0, 0.0, 15.0]);
        assert_eq!(ic.mass(), Some(51.0));

        let ms = im.ms_at_index(1).unwrap();
        assert_eq!(ms.mass_list(), im.masses());
        assert_eq!(ms.intensities(), &[5.0, 0.0, 30.0]);

        assert!(matches!(
            im.ic_at_mass(Some(99.0)),
            Err(MatrixError::MassOutOfRange { .. })
        ));
    }

    #[test]
    fn eic_sums_selected_bins() {
        let im = build_intensity_matrix_i(&three_scan_run()).unwrap();
        let eic = im.eic(&[50.0, 52.0]).unwrap();
        assert_eq!(eic.intensities(), &[10.0, 35.0, 25.0]);
        assert!(matches!(
            eic.kind(),
            ChromatogramKind::ExtractedIon { .. }
        ));
    }

    #[test]
    fn crop_and_null() {
        let mut im = build_intensity_matrix_i(&three_scan_run()).unwrap();
        im.null_mass(51.0).unwrap();
        assert_eq!(im.ic_at_mass(Some(51.0)).unwrap().intensities(), &[0.0; 3]);

        im.crop_mass(51.0, 52.0).unwrap();
        assert_eq!(im.masses(), &[51.0, 52.0]);
        assert_eq!(im.size(), (3, 2));

        assert!(im.crop_mass(52.0, 51.0).is_err());
    }

    #[test]
    fn extract_masses_builds_a_submatrix() {
        let im = build_intensity_matrix_i(&three_scan_run()).unwrap();
        let sub = im.extract_masses(&[52.0, 50.0]).unwrap();
        assert_eq!(sub.masses(), &[50.0, 52.0]);
        assert_eq!(sub.size(), (3, 2));
        assert_eq!(sub.ic_at_mass(Some(52.0)).unwrap().intensities(), &[0.0, 30.0, 25.0]);
    }

    #[test]
    fn reduce_mass_spectra_keeps_top_channels() {
        let mut im = build_intensity_matrix_i(&three_scan_run()).unwrap();
        im.reduce_mass_spectra(1);
        assert_eq!(im.scan_at_index(0).unwrap(), vec![0.0, 20.0, 0.0]);
        assert_eq!(im.scan_at_index(1).unwrap(), vec![0.0, 0.0, 30.0]);
    }

    #[test]
    fn set_ic_checks_shape() {
        let mut im = build_intensity_matrix_i(&three_scan_run()).unwrap();
        let short =
            IonChromatogram::new(vec![1.0], vec![0.0], ChromatogramKind::Tic).unwrap();
        assert!(matches!(
            im.set_ic_at_index(0, &short),
            Err(MatrixError::ShapeMismatch { .. })
        ));
    }
}
