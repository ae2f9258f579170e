//! Pipeline configuration.
//!
//! All knobs are carried explicitly; nothing reads process-global state.

use std::collections::HashSet;
use std::path::PathBuf;
use std::thread;

/// Restricts pairwise comparisons to a band around the diagonal.
///
/// With many experiments ordered by acquisition batch, distant pairs
/// rarely align well; sparse mode skips them except for whitelisted
/// columns that are always fully compared.
#[derive(Debug, Clone, Default)]
pub struct SparseMode {
    /// Compare pairs `(i, j)` with `j - i <= diagonal_width`.
    pub diagonal_width: usize,
    /// Experiment indices that are compared against everything.
    pub full_compare: HashSet<usize>,
}

impl SparseMode {
    /// Whether the pair `(i, j)` (with `i < j`) should be computed.
    pub fn includes(&self, i: usize, j: usize) -> bool {
        j - i <= self.diagonal_width
            || self.full_compare.contains(&i)
            || self.full_compare.contains(&j)
    }
}

/// Configuration for the pairwise-alignment driver.
#[derive(Debug, Clone, Default)]
pub struct AlignConfig {
    /// Run the pairwise similarity computation on a worker pool.
    pub parallel: bool,
    /// Worker count; `None` uses `max(2, cpu_count - 3)`.
    pub workers: Option<usize>,
    /// Progress checkpoint file, consulted at startup so interrupted runs
    /// resume without recomputation.
    pub checkpoint: Option<PathBuf>,
    /// Optional sparse comparison mode.
    pub sparse: Option<SparseMode>,
}

impl AlignConfig {
    /// A serial configuration with no checkpointing.
    pub fn serial() -> Self {
        Self::default()
    }

    /// A parallel configuration with the default worker count.
    pub fn parallel() -> Self {
        Self {
            parallel: true,
            ..Self::default()
        }
    }

    /// The effective worker count.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(workers) => workers.max(1),
            None => {
                let cpus = thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                cpus.saturating_sub(3).max(2)
            }
        }
    }
}
