//! Position similarity and the pairwise score matrix.

use ndarray::Array2;
use rayon::prelude::*;

use crate::peak::Peak;

use super::{Alignment, AlignError};

/// Tolerance below which the Gaussian RT weight is treated as zero.
const TOL: f64 = 1e-3;

/// Score matrix between two alignments: `S[i][j]` scores position `i` of
/// `a1` against position `j` of `a2`. Lower is better; scores lie in
/// `[0, 1]`.
pub fn score_matrix(
    a1: &Alignment,
    a2: &Alignment,
    d: f64,
) -> Result<Array2<f64>, AlignError> {
    let cutoff = rt_cutoff(d);
    let rows = a1.len();
    let cols = a2.len();

    let scored: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .map(|i| -> Result<Vec<f64>, AlignError> {
            let pos1 = &a1.positions()[i];
            let mut row = Vec::with_capacity(cols);
            for pos2 in a2.positions() {
                row.push(position_similarity_with_cutoff(pos1, pos2, d, cutoff)?);
            }
            Ok(row)
        })
        .collect::<Result<_, _>>()?;

    let mut matrix = Array2::ones((rows, cols));
    for (i, row) in scored.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }
    Ok(matrix)
}

/// Distance beyond which two peaks are scored as completely dissimilar.
pub(crate) fn rt_cutoff(d: f64) -> f64 {
    d * (-2.0 * TOL.ln()).sqrt()
}

/// Similarity between two alignment positions. 0 is best, 1 is worst.
///
/// Every non-null pair contributes either `1 - cos * w` (spectral cosine
/// times a Gaussian RT weight of width `d`) or the worst score 1.0 when
/// the RT gap exceeds the cutoff or a spectrum has zero norm; the result
/// is the mean over all pairs, or 1.0 when there are none.
pub fn position_similarity(
    pos1: &[Option<Peak>],
    pos2: &[Option<Peak>],
    d: f64,
) -> Result<f64, AlignError> {
    position_similarity_with_cutoff(pos1, pos2, d, rt_cutoff(d))
}

fn position_similarity_with_cutoff(
    pos1: &[Option<Peak>],
    pos2: &[Option<Peak>],
    d: f64,
    cutoff: f64,
) -> Result<f64, AlignError> {
    let mut score = 0.0;
    let mut count = 0_usize;

    for a in pos1.iter().flatten() {
        // the norm of a's spectrum is needed at most once per inner loop
        let mut norm1: Option<f64> = None;

        for b in pos2.iter().flatten() {
            count += 1;
            let rt_delta = (a.rt() - b.rt()).abs();
            if rt_delta > cutoff {
                score += 1.0;
                continue;
            }

            let (spec1, spec2) = match (a.mass_spectrum(), b.mass_spectrum()) {
                (Some(s1), Some(s2)) => (s1, s2),
                _ => {
                    score += 1.0;
                    continue;
                }
            };
            if spec1.len() != spec2.len() {
                return Err(AlignError::SpectraLengthMismatch {
                    left: spec1.len(),
                    right: spec2.len(),
                });
            }

            let n1 = *norm1
                .get_or_insert_with(|| spec1.intensities().iter().map(|v| v * v).sum::<f64>());
            let n2: f64 = spec2.intensities().iter().map(|v| v * v).sum();
            let all_squared = n1 * n2;
            if all_squared > 0.0 {
                let top: f64 = spec1
                    .intensities()
                    .iter()
                    .zip(spec2.intensities())
                    .map(|(x, y)| x * y)
                    .sum();
                let cos = top / all_squared.sqrt();
                let rtime = (-(rt_delta / d).powi(2) / 2.0).exp();
                score += 1.0 - cos * rtime;
            } else {
                score += 1.0;
            }
        }
    }

    if count == 0 {
        Ok(1.0)
    } else {
        Ok(score / count as f64)
    }
}
