use serde::{Deserialize, Serialize};

/// Deterministic block partition of a global index space over processes.
///
/// With `n_global` indices and `n_processes` ranks, the block size is
/// `K = ceil(n_global / n_processes)` and rank `p` owns the half-open
/// range `[p*K, min((p+1)*K, n_global))`. Every rank derives the same
/// partition from `(n_global, n_processes)` alone, so ownership never
/// has to be communicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalance {
    pub n_global: usize,
    pub n_processes: usize,
    block: usize,
}

impl LoadBalance {
    pub fn new(n_global: usize, n_processes: usize) -> Self {
        assert!(n_processes > 0, "need at least one process");
        let block = n_global.div_ceil(n_processes);
        Self {
            n_global,
            n_processes,
            block: block.max(1),
        }
    }

    /// Rank owning global index `g`.
    #[inline]
    pub fn owner(&self, g: usize) -> usize {
        debug_assert!(g < self.n_global);
        g / self.block
    }

    /// Offset of global index `g` within its owner's shard.
    #[inline]
    pub fn offset(&self, g: usize) -> usize {
        g % self.block
    }

    /// First global index owned by `rank`.
    #[inline]
    pub fn first(&self, rank: usize) -> usize {
        (rank * self.block).min(self.n_global)
    }

    /// Number of global indices owned by `rank`. Trailing ranks may own
    /// fewer than `block` indices, or none at all.
    #[inline]
    pub fn local_size(&self, rank: usize) -> usize {
        let first = self.first(rank);
        let last = ((rank + 1) * self.block).min(self.n_global);
        last - first
    }

    /// Global index of local slot `i` on `rank`.
    #[inline]
    pub fn global(&self, rank: usize, i: usize) -> usize {
        debug_assert!(i < self.local_size(rank));
        self.first(rank) + i
    }
}
