use serde::{Deserialize, Serialize};

/// Per-replica statistics sink.
///
/// Swap statistics are indexed by ladder interface (interface `i` sits
/// between chains `i` and `i+1`). A replica records an interface only
/// when it holds the lower chain of the pair, so each attempted swap is
/// counted exactly once per round across the whole ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recorder {
    /// Sum of swap rejection probabilities per interface.
    pub rejection_sum: Vec<f64>,
    /// Number of swap attempts per interface.
    pub attempt_count: Vec<u64>,
    /// Swaps whose acceptance probability came out NaN. Each one is
    /// recorded as a certain rejection.
    pub nan_count: u64,
    /// Moment accumulator over target-chain states, feeding the
    /// variational reference fit.
    pub moments: MomentAccum,
}

impl Recorder {
    pub fn new(n_interfaces: usize) -> Self {
        Self {
            rejection_sum: vec![0.0; n_interfaces],
            attempt_count: vec![0; n_interfaces],
            nan_count: 0,
            moments: MomentAccum::default(),
        }
    }

    /// Record one attempted swap on `interface` with the given acceptance
    /// probability. A NaN acceptance is a degenerate statistic: counted,
    /// and treated as rejection probability one.
    pub fn record_swap(&mut self, interface: usize, acceptance: f64) {
        let rejection = if acceptance.is_nan() {
            self.nan_count += 1;
            1.0
        } else {
            1.0 - acceptance.clamp(0.0, 1.0)
        };
        self.rejection_sum[interface] += rejection;
        self.attempt_count[interface] += 1;
    }

    /// Accumulate a target-chain state into the moment estimates.
    pub fn record_moments(&mut self, state: &[f64]) {
        self.moments.push(state);
    }

    /// Mean rejection probability observed on `interface`, zero if the
    /// interface was never attempted.
    pub fn mean_rejection(&self, interface: usize) -> f64 {
        if self.attempt_count[interface] == 0 {
            0.0
        } else {
            self.rejection_sum[interface] / self.attempt_count[interface] as f64
        }
    }

    /// Elementwise accumulate `other` into `self`.
    pub fn merge_from(&mut self, other: &Recorder) {
        debug_assert_eq!(self.rejection_sum.len(), other.rejection_sum.len());
        for (a, &b) in self.rejection_sum.iter_mut().zip(other.rejection_sum.iter()) {
            *a += b;
        }
        for (a, &b) in self.attempt_count.iter_mut().zip(other.attempt_count.iter()) {
            *a += b;
        }
        self.nan_count += other.nan_count;
        self.moments.merge_from(&other.moments);
    }
}

/// Merge per-replica recorders into one summary, folding in ascending
/// chain order. Chain order is identical for every process count, which
/// keeps the floating-point sums bit-identical across partitions.
pub fn merge_by_chain(n_interfaces: usize, mut pairs: Vec<(usize, Recorder)>) -> Recorder {
    pairs.sort_by_key(|(chain, _)| *chain);
    let mut merged = Recorder::new(n_interfaces);
    for (_, recorder) in &pairs {
        merged.merge_from(recorder);
    }
    merged
}

/// Streaming mean/variance accumulator over vector-valued states.
/// Dimension is fixed by the first pushed state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentAccum {
    pub count: u64,
    pub sum: Vec<f64>,
    pub sum_sq: Vec<f64>,
}

impl MomentAccum {
    pub fn push(&mut self, state: &[f64]) {
        if self.sum.is_empty() {
            self.sum = vec![0.0; state.len()];
            self.sum_sq = vec![0.0; state.len()];
        }
        debug_assert_eq!(self.sum.len(), state.len());
        self.count += 1;
        for (d, &x) in state.iter().enumerate() {
            self.sum[d] += x;
            self.sum_sq[d] += x * x;
        }
    }

    pub fn merge_from(&mut self, other: &MomentAccum) {
        if other.count == 0 {
            return;
        }
        if self.sum.is_empty() {
            self.sum = vec![0.0; other.sum.len()];
            self.sum_sq = vec![0.0; other.sum.len()];
        }
        self.count += other.count;
        for (a, &b) in self.sum.iter_mut().zip(other.sum.iter()) {
            *a += b;
        }
        for (a, &b) in self.sum_sq.iter_mut().zip(other.sum_sq.iter()) {
            *a += b;
        }
    }

    /// Per-coordinate sample mean, `None` before any state was pushed.
    pub fn mean(&self) -> Option<Vec<f64>> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(self.sum.iter().map(|&s| s / n).collect())
    }

    /// Per-coordinate sample standard deviation with a small floor to
    /// keep downstream log-densities finite.
    pub fn std(&self) -> Option<Vec<f64>> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(
            self.sum
                .iter()
                .zip(self.sum_sq.iter())
                .map(|(&s, &s2)| {
                    let mean = s / n;
                    (s2 / n - mean * mean).max(1e-6).sqrt()
                })
                .collect(),
        )
    }
}
