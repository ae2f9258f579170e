//! UPGMA guide tree over a distance matrix.
//!
//! Average-linkage hierarchical clustering. Original items are referenced
//! by non-negative indices; internal node `k` (created `k`-th, 0-based) is
//! referenced as `-(k + 1)`.

use ndarray::Array2;

/// One internal node of the guide tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    /// Left child: item index or negative internal-node reference.
    pub left: i32,
    /// Right child: item index or negative internal-node reference.
    pub right: i32,
    /// Linkage distance at which the children merged.
    pub distance: f64,
}

/// Clusters a symmetric distance matrix with average linkage.
///
/// Produces `n - 1` nodes; the last one is the root.
pub fn treecluster(dist: &Array2<f64>) -> Vec<TreeNode> {
    let n = dist.nrows();
    if n < 2 {
        return Vec::new();
    }

    // working copy with cluster ids and sizes; row/col `i` is cluster `i`
    let mut ids: Vec<i32> = (0..n as i32).collect();
    let mut sizes: Vec<f64> = vec![1.0; n];
    let mut work: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| dist[[i, j]]).collect())
        .collect();

    let mut nodes = Vec::with_capacity(n - 1);
    for k in 0..n - 1 {
        // closest active pair
        let mut best = (0_usize, 1_usize);
        let mut best_dist = f64::INFINITY;
        for i in 0..work.len() {
            for j in (i + 1)..work.len() {
                if work[i][j] < best_dist {
                    best_dist = work[i][j];
                    best = (i, j);
                }
            }
        }
        let (i, j) = best;
        nodes.push(TreeNode {
            left: ids[i],
            right: ids[j],
            distance: best_dist,
        });

        // average-linkage update: cluster i absorbs cluster j
        for m in 0..work.len() {
            if m == i || m == j {
                continue;
            }
            let merged =
                (work[i][m] * sizes[i] + work[j][m] * sizes[j]) / (sizes[i] + sizes[j]);
            work[i][m] = merged;
            work[m][i] = merged;
        }
        sizes[i] += sizes[j];
        ids[i] = -(k as i32 + 1);

        // drop cluster j
        work.remove(j);
        for row in &mut work {
            row.remove(j);
        }
        ids.remove(j);
        sizes.remove(j);
    }

    nodes
}
