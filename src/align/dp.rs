//! Needleman-Wunsch dynamic programming over a score matrix.

use ndarray::Array2;

use super::AlignError;

/// One step of the alignment traceback, in start-to-end order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStep {
    /// Both alignments advance: the positions match.
    Both,
    /// Only the first alignment advances: a gap in the second.
    AOnly,
    /// Only the second alignment advances: a gap in the first.
    BOnly,
}

const DIR_MATCH: u8 = 0;
const DIR_UP: u8 = 1;
const DIR_LEFT: u8 = 2;
const DIR_STOP: u8 = 3;

/// Solves the optimal global alignment path through a score matrix.
///
/// `score` holds per-pair dissimilarities (lower is better) and `gap` is a
/// linear gap penalty. Returns the traceback as steps from the start of
/// both alignments to their ends.
pub fn dp(score: &Array2<f64>, gap: f64) -> Result<Vec<TraceStep>, AlignError> {
    let (rows, cols) = score.dim();
    if rows == 0 || cols == 0 {
        return Err(AlignError::EmptyAlignment);
    }

    let mut dist = Array2::zeros((rows + 1, cols + 1));
    let mut trace = Array2::from_elem((rows + 1, cols + 1), DIR_STOP);
    for i in 1..=rows {
        dist[[i, 0]] = gap * i as f64;
        trace[[i, 0]] = DIR_UP;
    }
    for j in 1..=cols {
        dist[[0, j]] = gap * j as f64;
        trace[[0, j]] = DIR_LEFT;
    }

    for i in 1..=rows {
        for j in 1..=cols {
            let candidates = [
                dist[[i - 1, j - 1]] + score[[i - 1, j - 1]],
                dist[[i - 1, j]] + gap,
                dist[[i, j - 1]] + gap,
            ];
            // ties resolve towards a match, then towards a gap in the
            // second alignment
            let (direction, best) = candidates
                .iter()
                .enumerate()
                .fold((0usize, f64::INFINITY), |(bd, bv), (k, &v)| {
                    if v < bv {
                        (k, v)
                    } else {
                        (bd, bv)
                    }
                });
            dist[[i, j]] = best;
            trace[[i, j]] = direction as u8;
        }
    }

    let mut steps = Vec::with_capacity(rows + cols);
    let (mut i, mut j) = (rows, cols);
    loop {
        match trace[[i, j]] {
            DIR_MATCH => {
                i -= 1;
                j -= 1;
                steps.push(TraceStep::Both);
            }
            DIR_UP => {
                i -= 1;
                steps.push(TraceStep::AOnly);
            }
            DIR_LEFT => {
                j -= 1;
                steps.push(TraceStep::BOnly);
            }
            _ => break,
        }
    }
    steps.reverse();
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn single_cell_matches() {
        let score = arr2(&[[0.0]]);
        assert_eq!(dp(&score, 0.5).unwrap(), vec![TraceStep::Both]);
    }

    #[test]
    fn empty_matrices_fail() {
        let score = Array2::<f64>::zeros((0, 3));
        assert!(matches!(dp(&score, 0.5), Err(AlignError::EmptyAlignment)));
        let score = Array2::<f64>::zeros((3, 0));
        assert!(matches!(dp(&score, 0.5), Err(AlignError::EmptyAlignment)));
    }

    #[test]
    fn diagonal_of_good_scores_matches_throughout() {
        let score = arr2(&[
            [0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
        ]);
        let steps = dp(&score, 0.4).unwrap();
        assert_eq!(steps, vec![TraceStep::Both; 3]);
    }

    #[test]
    fn expensive_match_forces_gaps() {
        // matching costs 1.0 while two gaps cost 0.2: gap around it
        let score = arr2(&[[1.0]]);
        let steps = dp(&score, 0.1).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps.contains(&TraceStep::AOnly));
        assert!(steps.contains(&TraceStep::BOnly));
    }

    #[test]
    fn rectangular_matrices_consume_both_sides() {
        let score = arr2(&[
            [0.0, 0.9],
            [0.9, 0.0],
            [0.9, 0.9],
        ]);
        let steps = dp(&score, 0.3).unwrap();
        let a_steps = steps
            .iter()
            .filter(|s| matches!(s, TraceStep::Both | TraceStep::AOnly))
            .count();
        let b_steps = steps
            .iter()
            .filter(|s| matches!(s, TraceStep::Both | TraceStep::BOnly))
            .count();
        assert_eq!(a_steps, 3);
        assert_eq!(b_steps, 2);
    }
}
