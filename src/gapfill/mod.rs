//! Gap filling: reintegration of missing alignment entries.
//!
//! An alignment table usually has `NA` cells where peak detection missed a
//! compound in one run. For every missing entry the raw data is revisited:
//! the run is rebuilt as an integer-binned matrix, smoothed and
//! baseline-corrected, and the common (quantifier) ion's chromatogram is
//! searched for a maximum near the expected retention time whose qualifier
//! ions pass half the intensity threshold. The largest reintegrated area
//! fills the cell.

pub mod io;

use log::{error, info, warn};

use crate::baseline::tophat;
use crate::chromatogram::ChromatogramError;
use crate::detect::maxima_list_reduced;
use crate::formats::FormatError;
use crate::matrix::{build_intensity_matrix_i, MatrixError};
use crate::peak::area::{ion_area, DEFAULT_TOL};
use crate::raw::RawData;
use crate::smooth::{savitzky_golay, SmoothError};
use crate::units::WindowSize;

/// Errors raised by gap filling.
#[derive(Debug, thiserror::Error)]
pub enum GapFillError {
    /// I/O failure on a CSV table.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse or write failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column was absent from the table.
    #[error("missing column {0:?}")]
    MissingColumn(String),

    /// A UID cell that does not parse as `m1-m2-ratio-rt`.
    #[error("malformed UID {0:?}")]
    MalformedUid(String),

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Smooth(#[from] SmoothError),

    #[error(transparent)]
    Chromatogram(#[from] ChromatogramError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// One `NA` cell to be filled.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingPeak {
    common_ion: f64,
    qual_ion_1: f64,
    qual_ion_2: f64,
    rt: f64,
    row: usize,
    exact_rt: Option<f64>,
    common_ion_area: Option<f64>,
}

impl MissingPeak {
    /// Describes a missing peak by its quantifier ion, two qualifier ions,
    /// the expected retention time (seconds) and its table row.
    pub fn new(common_ion: f64, qual_ion_1: f64, qual_ion_2: f64, rt: f64, row: usize) -> Self {
        Self {
            common_ion,
            qual_ion_1,
            qual_ion_2,
            rt,
            row,
            exact_rt: None,
            common_ion_area: None,
        }
    }

    /// The quantifier ion.
    pub fn common_ion(&self) -> f64 {
        self.common_ion
    }

    /// Expected retention time in seconds.
    pub fn rt(&self) -> f64 {
        self.rt
    }

    /// Table row this cell belongs to.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Retention time of the reintegrated maximum, once found.
    pub fn exact_rt(&self) -> Option<f64> {
        self.exact_rt
    }

    /// Reintegrated area, once found.
    pub fn common_ion_area(&self) -> Option<f64> {
        self.common_ion_area
    }
}

/// The missing peaks of one experiment column.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    name: String,
    column: usize,
    missing_peaks: Vec<MissingPeak>,
}

impl Sample {
    /// Creates an empty sample for the experiment heading table column
    /// `column`.
    pub fn new(name: impl Into<String>, column: usize) -> Self {
        Self {
            name: name.into(),
            column,
            missing_peaks: Vec::new(),
        }
    }

    /// The experiment code.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table column this sample occupies.
    pub fn column(&self) -> usize {
        self.column
    }

    /// The missing peaks recorded for this sample.
    pub fn missing_peaks(&self) -> &[MissingPeak] {
        &self.missing_peaks
    }

    /// Records a missing peak.
    pub fn add_missing_peak(&mut self, peak: MissingPeak) {
        self.missing_peaks.push(peak);
    }
}

/// Tuning knobs for [`missing_peak_finder`].
#[derive(Debug, Clone)]
pub struct GapFillParams {
    /// Maxima-detection window in scans.
    pub points: usize,
    /// Ions to zero before searching (column-bleed ions).
    pub null_ions: Vec<f64>,
    /// Mass range to crop the matrix to.
    pub crop_ions: (f64, f64),
    /// Minimum common-ion intensity for a candidate maximum.
    pub threshold: f64,
    /// Half-width of the RT search window, in seconds.
    pub rt_window: f64,
}

impl Default for GapFillParams {
    fn default() -> Self {
        Self {
            points: 3,
            null_ions: vec![73.0, 147.0],
            crop_ions: (50.0, 540.0),
            threshold: 1000.0,
            rt_window: 1.0,
        }
    }
}

/// Searches one experiment's raw data for its missing peaks.
///
/// Per-missing-peak failures are logged and leave the cell empty; only
/// whole-run failures (binning, smoothing) are returned as errors.
pub fn missing_peak_finder(
    sample: &mut Sample,
    data: &RawData,
    params: &GapFillParams,
) -> Result<(), GapFillError> {
    info!("gap filling sample '{}'", sample.name);

    let mut im = build_intensity_matrix_i(data)?;
    for &ion in &params.null_ions {
        if let Err(e) = im.null_mass(ion) {
            warn!("cannot null ion {ion}: {e}");
        }
    }
    im.crop_mass(
        params.crop_ions.0.max(im.min_mass()),
        params.crop_ions.1.min(im.max_mass()),
    )?;

    let sg_window = WindowSize::Points(if params.points % 2 == 0 {
        params.points + 1
    } else {
        params.points
    });
    let baseline_window = WindowSize::from("1.5m");
    let im = im.map_columns(|ic| {
        let pass1 = savitzky_golay(ic, &sg_window, 2)?;
        let pass2 = savitzky_golay(&pass1, &sg_window, 2)?;
        tophat(&pass2, Some(&baseline_window))
    })?;

    for mp in &mut sample.missing_peaks {
        match find_one(&im, mp, params) {
            Ok(Some((rt, area))) => {
                info!("found area {area:.0} at rt {rt:.2} s");
                mp.exact_rt = Some(rt);
                mp.common_ion_area = Some(area);
            }
            Ok(None) => {
                info!("no candidate for missing peak at rt {:.2} s", mp.rt);
            }
            Err(e) => {
                warn!("missing peak at rt {:.2} s failed: {e}", mp.rt);
            }
        }
    }
    Ok(())
}

fn find_one(
    im: &crate::matrix::IntensityMatrix,
    mp: &MissingPeak,
    params: &GapFillParams,
) -> Result<Option<(f64, f64)>, GapFillError> {
    let common = im.ic_at_mass(Some(mp.common_ion))?;
    let qual1 = im.ic_at_mass(Some(mp.qual_ion_1))?;
    let qual2 = im.ic_at_mass(Some(mp.qual_ion_2))?;

    // the RT window expressed as a maxima window in scans
    let here = common.index_at_time(mp.rt)?;
    let earlier = common.index_at_time((mp.rt - params.rt_window).max(common.times()[0]))?;
    let window_points = (here - earlier).max(1);

    let candidates = maxima_list_reduced(&common, mp.rt, window_points, params.rt_window);

    let mut surviving: Vec<f64> = Vec::new();
    for (rt, intensity) in candidates {
        if intensity <= params.threshold {
            continue;
        }
        let q1 = qual1.intensity_at_index(qual1.index_at_time(rt)?)?;
        let q2 = qual2.intensity_at_index(qual2.index_at_time(rt)?)?;
        if q1 > params.threshold / 2.0 && q2 > params.threshold / 2.0 {
            surviving.push(rt);
        }
    }

    let mut best: Option<(f64, f64)> = None;
    for rt in surviving {
        let apex = common.index_at_time(rt)?;
        let result = ion_area(common.intensities(), apex, 0, DEFAULT_TOL);
        if best.map(|(_, area)| result.area > area).unwrap_or(true) {
            best = Some((rt, result.area));
        }
    }
    Ok(best)
}

/// Fills the missing peaks of every sample, loading raw data on demand.
///
/// `load` maps a sample name to its raw data; per-sample failures are
/// logged and the loop continues with the next sample.
pub fn fill_missing_peaks<F>(samples: &mut [Sample], mut load: F, params: &GapFillParams)
where
    F: FnMut(&str) -> Result<RawData, FormatError>,
{
    for sample in samples.iter_mut() {
        let data = match load(sample.name()) {
            Ok(data) => data,
            Err(e) => {
                error!("skipping sample '{}': {e}", sample.name());
                continue;
            }
        };
        if let Err(e) = missing_peak_finder(sample, &data, params) {
            error!("gap filling failed for '{}': {e}", sample.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::Scan;

    /// A run with Gaussian peaks for ions 60/61/62 around t = 50 s.
    fn synthetic_run() -> RawData {
        let n = 200;
        let times: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let scans = times
            .iter()
            .map(|&t| {
                let peak = 50_000.0 * (-((t - 50.0) / 4.0).powi(2) / 2.0).exp();
                Scan::new(
                    vec![60.0, 61.0, 62.0, 73.0],
                    vec![peak, peak * 0.6, peak * 0.4, 42.0],
                )
                .unwrap()
            })
            .collect();
        RawData::new(times, scans).unwrap()
    }

    fn params() -> GapFillParams {
        GapFillParams {
            crop_ions: (55.0, 70.0),
            rt_window: 5.0,
            ..GapFillParams::default()
        }
    }

    #[test]
    fn fills_a_missing_peak_near_the_expected_rt() {
        let mut sample = Sample::new("run-1", 3);
        sample.add_missing_peak(MissingPeak::new(60.0, 61.0, 62.0, 52.0, 0));

        missing_peak_finder(&mut sample, &synthetic_run(), &params()).unwrap();

        let mp = &sample.missing_peaks()[0];
        let area = mp.common_ion_area().expect("area should be filled");
        assert!(area > 100_000.0, "area was {area}");
        let rt = mp.exact_rt().expect("rt should be filled");
        assert!((rt - 50.0).abs() <= 2.0, "rt was {rt}");
    }

    #[test]
    fn candidates_below_threshold_leave_the_cell_empty() {
        let mut sample = Sample::new("run-1", 3);
        sample.add_missing_peak(MissingPeak::new(60.0, 61.0, 62.0, 52.0, 0));
        let mut strict = params();
        strict.threshold = 1e9;

        missing_peak_finder(&mut sample, &synthetic_run(), &strict).unwrap();
        assert_eq!(sample.missing_peaks()[0].common_ion_area(), None);
    }

    #[test]
    fn driver_continues_past_failing_samples() {
        let mut samples = vec![Sample::new("missing-file", 3), Sample::new("run-1", 4)];
        samples[1].add_missing_peak(MissingPeak::new(60.0, 61.0, 62.0, 52.0, 0));

        fill_missing_peaks(
            &mut samples,
            |name| {
                if name == "run-1" {
                    Ok(synthetic_run())
                } else {
                    Err(FormatError::MissingField("no such file".into()))
                }
            },
            &params(),
        );
        assert!(samples[1].missing_peaks()[0].common_ion_area().is_some());
    }
}
