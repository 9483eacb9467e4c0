use serde::{Deserialize, Serialize};

/// Which leg of the ladder a chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leg {
    Fixed,
    Variational,
}

/// Bijection between global chain indices and `(leg, local chain)`
/// pairs for the reflected two-leg layout
///
/// ```text
///   global:  0 .. n_fixed-1 | n_fixed .. n_fixed+n_variational-1
///   layout:  ref -> target  | target <- ref
/// ```
///
/// The variational leg is stored reversed so that its target chain sits
/// at the fold: global chain `n_fixed + k` is variational local chain
/// `n_variational - 1 - k`. With `n_variational == 0` every chain is
/// fixed-leg and the indexer is the identity.
///
/// Built from the tempering each round; read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIndexer {
    pub n_fixed: usize,
    pub n_variational: usize,
}

impl ChainIndexer {
    pub fn n_total(&self) -> usize {
        self.n_fixed + self.n_variational
    }

    /// Resolve a global chain to its leg and leg-local chain index.
    pub fn leg_of(&self, chain: usize) -> (Leg, usize) {
        debug_assert!(chain < self.n_total());
        if chain < self.n_fixed {
            (Leg::Fixed, chain)
        } else {
            (Leg::Variational, self.n_variational - 1 - (chain - self.n_fixed))
        }
    }

    /// Inverse of [`leg_of`](Self::leg_of).
    pub fn global_of(&self, leg: Leg, local: usize) -> usize {
        match leg {
            Leg::Fixed => {
                debug_assert!(local < self.n_fixed);
                local
            }
            Leg::Variational => {
                debug_assert!(local < self.n_variational);
                self.n_fixed + (self.n_variational - 1 - local)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_and_five_layout() {
        // Two legs of five chains. The variational leg is reversed:
        // global 5 (first past the fold) is its target, local 4;
        // global 9 (the far end) is its reference, local 0.
        let idx = ChainIndexer {
            n_fixed: 5,
            n_variational: 5,
        };
        assert_eq!(idx.leg_of(0), (Leg::Fixed, 0));
        assert_eq!(idx.leg_of(4), (Leg::Fixed, 4));
        assert_eq!(idx.leg_of(5), (Leg::Variational, 4));
        assert_eq!(idx.leg_of(9), (Leg::Variational, 0));
    }

    #[test]
    fn identity_without_variational_leg() {
        let idx = ChainIndexer {
            n_fixed: 4,
            n_variational: 0,
        };
        for c in 0..4 {
            assert_eq!(idx.leg_of(c), (Leg::Fixed, c));
        }
    }

    #[test]
    fn leg_of_and_global_of_are_inverse() {
        for (nf, nv) in [(1, 1), (3, 2), (5, 5), (4, 0)] {
            let idx = ChainIndexer {
                n_fixed: nf,
                n_variational: nv,
            };
            for c in 0..idx.n_total() {
                let (leg, local) = idx.leg_of(c);
                assert_eq!(idx.global_of(leg, local), c, "nf={nf} nv={nv} c={c}");
            }
        }
    }
}
