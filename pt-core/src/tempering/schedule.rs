use serde::{Deserialize, Serialize};

/// Ordered annealing parameters in `[0, 1]` for one leg of the ladder.
/// Index 0 is the reference end, the last index is the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub betas: Vec<f64>,
}

impl Schedule {
    /// The first-round schedule: `n` equally spaced parameters with the
    /// endpoints pinned to 0 and 1. A single-chain leg sits at the
    /// target.
    pub fn equally_spaced(n: usize) -> Self {
        assert!(n >= 1, "a leg needs at least one chain");
        if n == 1 {
            return Self { betas: vec![1.0] };
        }
        let betas = (0..n)
            .map(|i| i as f64 / (n - 1) as f64)
            .collect();
        Self { betas }
    }

    pub fn len(&self) -> usize {
        self.betas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.betas.is_empty()
    }

    /// Choose a new schedule of the same length that equalizes rejection
    /// across interfaces, by inverting the piecewise-linear cumulative
    /// barrier `knots = [(beta_k, lambda_k)]` at equally spaced levels.
    ///
    /// Knots must start at the reference, end at the target, and carry
    /// nondecreasing lambda. A flat barrier falls back to equal spacing.
    pub fn from_cumulative_barrier(knots: &[(f64, f64)], n: usize) -> Self {
        let total = knots.last().map_or(0.0, |&(_, l)| l);
        if n <= 2 || total <= 1e-12 {
            return Self::equally_spaced(n);
        }
        debug_assert!(knots.len() >= 2);

        let mut betas = Vec::with_capacity(n);
        betas.push(0.0);
        let mut k = 0;
        for j in 1..n - 1 {
            let level = total * j as f64 / (n - 1) as f64;
            while k + 1 < knots.len() - 1 && knots[k + 1].1 < level {
                k += 1;
            }
            let (b0, l0) = knots[k];
            let (b1, l1) = knots[k + 1];
            let beta = if l1 > l0 {
                b0 + (b1 - b0) * (level - l0) / (l1 - l0)
            } else {
                // Flat segment: no rejection mass to spread here.
                b1
            };
            betas.push(beta.clamp(0.0, 1.0));
        }
        betas.push(1.0);
        Self { betas }
    }
}
