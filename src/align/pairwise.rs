//! Hierarchical alignment of many experiments.
//!
//! Builds the symmetric similarity matrix over all input alignments,
//! converts it to a distance matrix and clusters it into a UPGMA guide
//! tree; [`align_with_tree`] then merges the inputs pairwise in the tree's
//! post-order until one alignment remains.

use log::info;
use ndarray::Array2;

use crate::config::AlignConfig;

use super::pool;
use super::tree::{treecluster, TreeNode};
use super::{align, Alignment, AlignError};

/// Pairwise alignment driver: similarity matrix, distance matrix, guide
/// tree.
#[derive(Debug, Clone)]
pub struct PairwiseAlignment {
    alignments: Vec<Alignment>,
    d: f64,
    gap: f64,
    sim_matrix: Array2<f64>,
    dist_matrix: Array2<f64>,
    tree: Vec<TreeNode>,
}

impl PairwiseAlignment {
    /// Computes all pairwise similarities and the guide tree.
    ///
    /// `d` is the retention-time tolerance and `gap` the DP gap penalty.
    /// With `config.parallel` the pairs are computed on a worker pool,
    /// optionally resuming from a checkpoint; otherwise serially.
    pub fn new(
        alignments: Vec<Alignment>,
        d: f64,
        gap: f64,
        config: &AlignConfig,
    ) -> Result<Self, AlignError> {
        if alignments.is_empty() {
            return Err(AlignError::EmptyAlignment);
        }
        let n = alignments.len();
        info!(
            "calculating pairwise alignments for {n} alignments (D={d:.2}, gap={gap:.2})"
        );

        let sim_matrix = if config.parallel {
            pool::similarity_matrix(&alignments, d, gap, config)?
        } else {
            Self::serial_similarity_matrix(&alignments, d, gap)?
        };

        let dist_matrix = Self::distance_matrix(&sim_matrix);

        info!("clustering {} pairwise alignments", n * n.saturating_sub(1));
        let tree = treecluster(&dist_matrix);

        Ok(Self {
            alignments,
            d,
            gap,
            sim_matrix,
            dist_matrix,
            tree,
        })
    }

    fn serial_similarity_matrix(
        alignments: &[Alignment],
        d: f64,
        gap: f64,
    ) -> Result<Array2<f64>, AlignError> {
        let n = alignments.len();
        let mut sim = Array2::zeros((n, n));
        let mut remaining = n * n.saturating_sub(1) / 2;
        for i in 0..n.saturating_sub(1) {
            for j in (i + 1)..n {
                let merged = align(&alignments[i], &alignments[j], d, gap)?;
                let similarity = merged.similarity().unwrap_or(0.0);
                sim[[i, j]] = similarity;
                sim[[j, i]] = similarity;
                remaining -= 1;
                info!("{remaining} pair(s) remaining");
            }
        }
        Ok(sim)
    }

    /// `max(sim) - sim` with a zero diagonal.
    fn distance_matrix(sim: &Array2<f64>) -> Array2<f64> {
        let max = sim.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut dist = sim.mapv(|v| max - v);
        for i in 0..dist.nrows() {
            dist[[i, i]] = 0.0;
        }
        dist
    }

    /// The input alignments, in their original order.
    pub fn alignments(&self) -> &[Alignment] {
        &self.alignments
    }

    /// The retention-time tolerance.
    pub fn d(&self) -> f64 {
        self.d
    }

    /// The gap penalty.
    pub fn gap(&self) -> f64 {
        self.gap
    }

    /// The symmetric pairwise similarity matrix.
    pub fn similarity_matrix(&self) -> &Array2<f64> {
        &self.sim_matrix
    }

    /// The derived distance matrix.
    pub fn distance_matrix_ref(&self) -> &Array2<f64> {
        &self.dist_matrix
    }

    /// The UPGMA guide tree; the last node is the root.
    pub fn tree(&self) -> &[TreeNode] {
        &self.tree
    }
}

/// Merges all input alignments along the guide tree.
///
/// Allocates `2n` slots, places the inputs in the first `n`, and assigns
/// internal node `-k` to slot `2n - k` in post-order; the root is the
/// final alignment. Positions with fewer than `min_peaks` peaks are
/// dropped from the result.
pub fn align_with_tree(
    t: &PairwiseAlignment,
    min_peaks: usize,
) -> Result<Alignment, AlignError> {
    let n = t.alignments().len();
    info!(
        "aligning {n} item(s) with guide tree (D={:.2}, gap={:.2})",
        t.d(),
        t.gap()
    );

    let mut slots: Vec<Option<Alignment>> = t.alignments().iter().cloned().map(Some).collect();
    slots.resize(2 * n, None);

    let resolve = |id: i32| -> usize {
        if id >= 0 {
            id as usize
        } else {
            (2 * n as i32 + id) as usize
        }
    };

    let total = t.tree().len();
    let mut last_assigned = 0_usize;
    for (k, node) in t.tree().iter().enumerate() {
        let left = slots[resolve(node.left)]
            .clone()
            .ok_or(AlignError::BadTreeNode(node.left))?;
        let right = slots[resolve(node.right)]
            .clone()
            .ok_or(AlignError::BadTreeNode(node.right))?;
        let merged = align(&left, &right, t.d(), t.gap())?;
        last_assigned = 2 * n - (k + 1);
        slots[last_assigned] = Some(merged);
        info!("{} item(s) remaining", total - k - 1);
    }

    let mut root = if total == 0 {
        // a single input: nothing to merge
        slots[0].clone().ok_or(AlignError::EmptyAlignment)?
    } else {
        slots[last_assigned]
            .take()
            .ok_or(AlignError::EmptyAlignment)?
    };

    if min_peaks > 1 {
        root.filter_min_peaks(min_peaks);
    }
    Ok(root)
}
