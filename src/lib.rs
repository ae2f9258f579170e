//! # elution - GC-MS processing and alignment
//!
//! `elution` turns raw gas-chromatography mass-spectrometry runs into
//! aligned, quantified peak tables:
//!
//! 1. **Ingest** - parse JCAMP-DX or mzML files into [`raw::RawData`]
//!    (retention times + sparse scans).
//! 2. **Bin** - build a dense scan x mass [`matrix::IntensityMatrix`].
//! 3. **Clean** - smooth each ion chromatogram (Savitzky-Golay or moving
//!    window) and remove the baseline (white top-hat).
//! 4. **Detect** - find peaks with the Biller-Biemann algorithm, filter
//!    them by relative intensity and ion count, and integrate areas.
//! 5. **Align** - merge the peak lists of many experiments by dynamic
//!    programming along a UPGMA guide tree, in parallel with resumable
//!    checkpoints.
//! 6. **Fill** - reintegrate raw data where the aligned table has gaps.
//!
//! ## Quick start
//!
//! ```rust
//! use elution::align::{align_with_tree, exprl2alignment, PairwiseAlignment};
//! use elution::config::AlignConfig;
//! use elution::detect::biller_biemann;
//! use elution::experiment::Experiment;
//! use elution::matrix::build_intensity_matrix_i;
//! use elution::peak::area::integrate_peak;
//! use elution::peak::filter::{num_ions_threshold, rel_threshold};
//! use elution::raw::{RawData, Scan};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // three synthetic scans; real runs come from formats::jcamp / formats::mzml
//! let data = RawData::new(
//!     vec![0.0, 1.0, 2.0],
//!     vec![
//!         Scan::new(vec![50.0, 51.0], vec![10.0, 20.0])?,
//!         Scan::new(vec![50.0, 51.0], vec![100.0, 200.0])?,
//!         Scan::new(vec![50.0, 51.0], vec![10.0, 20.0])?,
//!     ],
//! )?;
//!
//! let im = build_intensity_matrix_i(&data)?;
//! let peaks = biller_biemann(&im, 3, 1);
//! let peaks = rel_threshold(&peaks, 2.0)?;
//! let mut peaks = num_ions_threshold(&peaks, 1, 10.0);
//! for peak in &mut peaks {
//!     integrate_peak(&im, peak, 0)?;
//! }
//!
//! let expr = Experiment::new("wt-01", peaks);
//! let singles = exprl2alignment(std::slice::from_ref(&expr));
//! let pairwise = PairwiseAlignment::new(singles, 2.5, 0.3, &AlignConfig::serial())?;
//! let table = align_with_tree(&pairwise, 1)?;
//! assert_eq!(table.n_experiments(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module map
//!
//! - [`raw`] - scans, runs, the TIC
//! - [`formats`] - JCAMP-DX and mzML parsers
//! - [`matrix`] - binning and the intensity matrix
//! - [`chromatogram`] / [`spectrum`] - the slice value types
//! - [`smooth`] / [`baseline`] / [`noise`] - per-ion signal conditioning
//! - [`detect`] - Biller-Biemann peak detection
//! - [`peak`] - the peak model, filters, area integration
//! - [`experiment`] - peak lists scoped to a sample code
//! - [`align`] - score matrix, DP, guide tree, worker pool, CSV output
//! - [`gapfill`] - reintegration of missing table entries
//! - [`config`] - explicit pipeline configuration
//! - [`units`] - time strings and window conversion

pub mod align;
pub mod baseline;
pub mod chromatogram;
pub mod config;
pub mod detect;
pub mod experiment;
pub mod formats;
pub mod gapfill;
pub mod math;
pub mod matrix;
pub mod noise;
pub mod peak;
pub mod raw;
pub mod smooth;
pub mod spectrum;
pub mod units;

pub use align::{align, exprl2alignment, Alignment, PairwiseAlignment};
pub use chromatogram::{ChromatogramKind, IonChromatogram};
pub use config::AlignConfig;
pub use experiment::Experiment;
pub use matrix::{build_intensity_matrix, build_intensity_matrix_i, IntensityMatrix};
pub use peak::Peak;
pub use raw::{RawData, Scan};
pub use spectrum::MassSpectrum;
