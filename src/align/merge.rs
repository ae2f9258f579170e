//! Merging two alignments along a DP traceback.

use ndarray::Array2;

use crate::peak::Peak;

use super::dp::TraceStep;
use super::Alignment;

/// Merges two alignments, inserting gaps where the traceback demands.
///
/// The merged table has one column per experiment of both inputs and one
/// position per trace step; positions are sorted by the mean retention
/// time of their non-null peaks.
pub fn merge_alignments(a1: &Alignment, a2: &Alignment, trace: &[TraceStep]) -> Alignment {
    let n1 = a1.n_experiments();
    let n2 = a2.n_experiments();

    let mut expr_codes = Vec::with_capacity(n1 + n2);
    expr_codes.extend_from_slice(a1.expr_codes());
    expr_codes.extend_from_slice(a2.expr_codes());

    let mut positions: Vec<Vec<Option<Peak>>> = Vec::with_capacity(trace.len());
    let (mut idx1, mut idx2) = (0_usize, 0_usize);
    for step in trace {
        let mut row: Vec<Option<Peak>> = Vec::with_capacity(n1 + n2);
        match step {
            TraceStep::Both => {
                row.extend_from_slice(&a1.positions()[idx1]);
                row.extend_from_slice(&a2.positions()[idx2]);
                idx1 += 1;
                idx2 += 1;
            }
            TraceStep::AOnly => {
                row.extend_from_slice(&a1.positions()[idx1]);
                row.extend(std::iter::repeat_with(|| None).take(n2));
                idx1 += 1;
            }
            TraceStep::BOnly => {
                row.extend(std::iter::repeat_with(|| None).take(n1));
                row.extend_from_slice(&a2.positions()[idx2]);
                idx2 += 1;
            }
        }
        positions.push(row);
    }

    positions.sort_by(|x, y| {
        Alignment::mean_position_rt(x).total_cmp(&Alignment::mean_position_rt(y))
    });

    Alignment::from_parts(positions, expr_codes)
}

/// Similarity score of a merge: the summed `1 - S` over matched pairs,
/// minus the gap penalty for every gap step. Higher is more similar.
pub fn alignment_similarity(trace: &[TraceStep], score: &Array2<f64>, gap: f64) -> f64 {
    let mut similarity = 0.0;
    let (mut idx1, mut idx2) = (0_usize, 0_usize);
    for step in trace {
        match step {
            TraceStep::Both => {
                similarity += 1.0 - score[[idx1, idx2]];
                idx1 += 1;
                idx2 += 1;
            }
            TraceStep::AOnly => {
                similarity -= gap;
                idx1 += 1;
            }
            TraceStep::BOnly => {
                similarity -= gap;
                idx2 += 1;
            }
        }
    }
    similarity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::Experiment;
    use crate::spectrum::MassSpectrum;
    use ndarray::arr2;

    fn peak_at(rt: f64) -> Peak {
        let ms = MassSpectrum::new(vec![50.0, 51.0], vec![3.0, 7.0]).unwrap();
        Peak::with_spectrum(rt, ms)
    }

    fn singleton(code: &str, rts: &[f64]) -> Alignment {
        let peaks = rts.iter().map(|&rt| peak_at(rt)).collect();
        Alignment::from_experiment(&Experiment::new(code, peaks))
    }

    #[test]
    fn matched_merge_keeps_both_columns() {
        let a = singleton("a", &[60.0, 90.0]);
        let b = singleton("b", &[60.5, 90.5]);
        let trace = vec![TraceStep::Both, TraceStep::Both];
        let merged = merge_alignments(&a, &b, &trace);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.expr_codes(), &["a".to_string(), "b".to_string()]);
        for position in merged.positions() {
            assert_eq!(position.iter().flatten().count(), 2);
        }
    }

    #[test]
    fn gaps_fill_with_nulls_and_preserve_counts() {
        let a = singleton("a", &[60.0, 120.0]);
        let b = singleton("b", &[90.0]);
        let trace = vec![TraceStep::AOnly, TraceStep::BOnly, TraceStep::AOnly];
        let merged = merge_alignments(&a, &b, &trace);

        assert_eq!(merged.len(), 3);
        // per-column peak counts survive the merge
        let col_a = merged.experiment_column(0);
        let col_b = merged.experiment_column(1);
        assert_eq!(col_a.iter().flatten().count(), 2);
        assert_eq!(col_b.iter().flatten().count(), 1);
        // every position holds at least one peak
        for position in merged.positions() {
            assert!(position.iter().flatten().count() >= 1);
        }
    }

    #[test]
    fn positions_are_sorted_by_mean_rt() {
        let a = singleton("a", &[120.0]);
        let b = singleton("b", &[60.0]);
        let trace = vec![TraceStep::AOnly, TraceStep::BOnly];
        let merged = merge_alignments(&a, &b, &trace);

        let first = Alignment::mean_position_rt(&merged.positions()[0]);
        let second = Alignment::mean_position_rt(&merged.positions()[1]);
        assert!(first <= second);
        assert_eq!(first, 60.0);
    }

    #[test]
    fn similarity_rewards_matches_and_penalises_gaps() {
        let score = arr2(&[[0.1, 1.0], [1.0, 0.2]]);
        let trace = vec![TraceStep::Both, TraceStep::Both];
        let sim = alignment_similarity(&trace, &score, 0.3);
        assert!((sim - (0.9 + 0.8)).abs() < 1e-12);

        let trace = vec![TraceStep::Both, TraceStep::AOnly, TraceStep::BOnly];
        let sim = alignment_similarity(&trace, &score, 0.3);
        assert!((sim - (0.9 - 0.3 - 0.3)).abs() < 1e-12);
    }

    #[test]
    fn single_cell_similarity_is_one() {
        let score = arr2(&[[0.0]]);
        let sim = alignment_similarity(&[TraceStep::Both], &score, 0.5);
        assert_eq!(sim, 1.0);
    }
}
