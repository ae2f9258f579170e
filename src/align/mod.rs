//! Peak alignment by dynamic programming.
//!
//! Experiments become singleton alignments (one column each); pairs of
//! alignments are merged by Needleman-Wunsch over a spectral/retention
//! similarity score; and a UPGMA guide tree drives the hierarchical merge
//! of many experiments into one table. The `N * (N - 1) / 2` pairwise
//! similarity computations can run on a worker pool with resumable
//! checkpoints.

pub mod checkpoint;
pub mod composite;
pub mod dp;
pub mod io;
pub mod merge;
pub mod pairwise;
pub(crate) mod pool;
pub mod score;
pub mod tree;

pub use dp::TraceStep;
pub use pairwise::{align_with_tree, PairwiseAlignment};

use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::experiment::Experiment;
use crate::math;
use crate::peak::Peak;

/// Errors raised by the alignment machinery.
#[derive(Debug, thiserror::Error)]
pub enum AlignError {
    /// Dynamic programming over a zero-sized alignment.
    #[error("zero-length alignment: samples with no peaks cannot be aligned")]
    EmptyAlignment,

    /// Two apex spectra with different mass-axis lengths were compared.
    #[error(
        "mass spectra are of different lengths ({left} vs {right}); \
         crop the intensity matrices to a common mass range"
    )]
    SpectraLengthMismatch { left: usize, right: usize },

    /// The guide tree referenced a slot that was never filled.
    #[error("guide tree referenced an unassigned slot {0}")]
    BadTreeNode(i32),

    /// Worker-pool failure.
    #[error("alignment pool: {0}")]
    Pool(String),

    /// I/O failure (checkpoint or CSV output).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV output failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// An alignment of peak lists.
///
/// The table is stored position-major: `positions()[p][e]` is the peak (or
/// gap) of experiment `e` at aligned position `p`. The experiment-major
/// view is derived by [`Alignment::experiment_column`]. Every position
/// holds at least one non-null peak.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    positions: Vec<Vec<Option<Peak>>>,
    expr_codes: Vec<String>,
    similarity: Option<f64>,
}

impl Alignment {
    /// Creates a singleton alignment: one column holding the experiment's
    /// peaks in order.
    pub fn from_experiment(expr: &Experiment) -> Self {
        Self {
            positions: expr
                .peaks()
                .iter()
                .map(|peak| vec![Some(peak.clone())])
                .collect(),
            expr_codes: vec![expr.code().to_string()],
            similarity: None,
        }
    }

    pub(crate) fn from_parts(
        positions: Vec<Vec<Option<Peak>>>,
        expr_codes: Vec<String>,
    ) -> Self {
        Self {
            positions,
            expr_codes,
            similarity: None,
        }
    }

    /// Number of aligned positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the alignment holds no positions.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of experiment columns.
    pub fn n_experiments(&self) -> usize {
        self.expr_codes.len()
    }

    /// The position-major table.
    pub fn positions(&self) -> &[Vec<Option<Peak>>] {
        &self.positions
    }

    /// One aligned position, if in range.
    pub fn position(&self, index: usize) -> Option<&[Option<Peak>]> {
        self.positions.get(index).map(Vec::as_slice)
    }

    /// The experiment codes, one per column.
    pub fn expr_codes(&self) -> &[String] {
        &self.expr_codes
    }

    /// The similarity score of the merge that produced this alignment.
    pub fn similarity(&self) -> Option<f64> {
        self.similarity
    }

    pub(crate) fn set_similarity(&mut self, similarity: f64) {
        self.similarity = Some(similarity);
    }

    /// The experiment-major view of one column.
    pub fn experiment_column(&self, expr_index: usize) -> Vec<Option<&Peak>> {
        self.positions
            .iter()
            .map(|position| position.get(expr_index).and_then(Option::as_ref))
            .collect()
    }

    /// Drops positions holding fewer than `min_peaks` non-null peaks.
    pub fn filter_min_peaks(&mut self, min_peaks: usize) {
        self.positions
            .retain(|position| position.iter().flatten().count() >= min_peaks);
    }

    /// A composite peak per aligned position.
    ///
    /// Positions whose peaks carry no usable spectra yield `None`.
    pub fn aligned_peaks(&self, ignore_outliers: bool) -> Vec<Option<Peak>> {
        self.positions
            .iter()
            .map(|position| {
                let contributing: Vec<&Peak> = position.iter().flatten().collect();
                composite::composite_peak(&contributing, ignore_outliers)
            })
            .collect()
    }

    /// The most frequent quantifier ion per aligned position.
    ///
    /// Counts each peak's recorded top ions across the row and picks the
    /// ion seen most often, breaking ties towards the heavier mass.
    pub fn common_ion(&self) -> Vec<Option<f64>> {
        self.positions
            .iter()
            .map(|position| {
                let mut counts: HashMap<OrderedFloat<f64>, usize> = HashMap::new();
                for peak in position.iter().flatten() {
                    for (mass, _) in peak.ion_areas() {
                        *counts.entry(OrderedFloat(*mass)).or_insert(0) += 1;
                    }
                }
                counts
                    .into_iter()
                    .max_by(|(mass_a, count_a), (mass_b, count_b)| {
                        count_a.cmp(count_b).then(mass_a.cmp(mass_b))
                    })
                    .map(|(mass, _)| mass.into_inner())
            })
            .collect()
    }

    /// Mean retention time of the non-null peaks at a position.
    pub(crate) fn mean_position_rt(position: &[Option<Peak>]) -> f64 {
        let rts: Vec<f64> = position.iter().flatten().map(Peak::rt).collect();
        math::mean(&rts)
    }
}

/// Converts experiments into singleton alignments, one column each.
pub fn exprl2alignment(exprs: &[Experiment]) -> Vec<Alignment> {
    exprs.iter().map(Alignment::from_experiment).collect()
}

/// Aligns two alignments: score matrix, dynamic programming, merge.
///
/// The returned alignment carries the similarity score of the merge.
pub fn align(a1: &Alignment, a2: &Alignment, d: f64, gap: f64) -> Result<Alignment, AlignError> {
    let score = score::score_matrix(a1, a2, d)?;
    let trace = dp::dp(&score, gap)?;
    let mut merged = merge::merge_alignments(a1, a2, &trace);
    merged.set_similarity(merge::alignment_similarity(&trace, &score, gap));
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::MassSpectrum;

    fn peak_at(rt: f64, intensities: Vec<f64>) -> Peak {
        let masses: Vec<f64> = (0..intensities.len()).map(|i| 50.0 + i as f64).collect();
        Peak::with_spectrum(rt, MassSpectrum::new(masses, intensities).unwrap())
    }

    #[test]
    fn singleton_alignments_hold_every_peak() {
        let exprs = vec![
            Experiment::new("a", vec![peak_at(1.0, vec![1.0, 2.0])]),
            Experiment::new("b", vec![peak_at(1.0, vec![1.0, 2.0]), peak_at(2.0, vec![2.0, 1.0])]),
        ];
        let singles = exprl2alignment(&exprs);
        assert_eq!(singles.len(), 2);
        let total: usize = singles.iter().map(Alignment::len).sum();
        assert_eq!(total, 3);
        for single in &singles {
            assert_eq!(single.n_experiments(), 1);
        }
    }

    #[test]
    fn column_extraction_round_trips() {
        let expr = Experiment::new(
            "a",
            vec![peak_at(1.0, vec![1.0, 2.0]), peak_at(2.0, vec![3.0, 4.0])],
        );
        let single = Alignment::from_experiment(&expr);
        let column = single.experiment_column(0);
        let rts: Vec<f64> = column.iter().flatten().map(|p| p.rt()).collect();
        assert_eq!(rts, vec![1.0, 2.0]);
    }

    #[test]
    fn min_peaks_filter_drops_sparse_rows() {
        let mut alignment = Alignment::from_parts(
            vec![
                vec![Some(peak_at(1.0, vec![1.0])), None],
                vec![Some(peak_at(2.0, vec![1.0])), Some(peak_at(2.1, vec![1.0]))],
            ],
            vec!["a".into(), "b".into()],
        );
        alignment.filter_min_peaks(2);
        assert_eq!(alignment.len(), 1);
    }

    #[test]
    fn common_ion_picks_the_most_frequent() {
        let mut p1 = peak_at(1.0, vec![1.0, 2.0]);
        p1.set_ion_areas(vec![(73.0, 10.0), (147.0, 5.0)]);
        let mut p2 = peak_at(1.1, vec![1.0, 2.0]);
        p2.set_ion_areas(vec![(73.0, 8.0), (91.0, 3.0)]);
        let alignment = Alignment::from_parts(
            vec![vec![Some(p1), Some(p2)]],
            vec!["a".into(), "b".into()],
        );
        assert_eq!(alignment.common_ion(), vec![Some(73.0)]);
    }
}
