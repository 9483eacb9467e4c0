use crate::error::PtError;

/// Deterministic even-odd swap graph: a pure involution
/// `chain -> partner chain` for a given round.
///
/// In odd rounds interfaces (0,1), (2,3), ... are proposed; in even
/// rounds (1,2), (3,4), ... Chains left unpaired at the boundaries
/// partner with themselves, which the driver treats as a no-op.
///
/// The variational variant runs the same parity rule over the reflected
/// two-leg layout `fixed-ref .. fixed-target | var-target .. var-ref`,
/// so the fold interface between the two target chains is proposed on
/// the ordinary cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapGraph {
    Deo {
        n_chains: usize,
        round: usize,
    },
    VariationalDeo {
        n_fixed: usize,
        n_variational: usize,
        round: usize,
    },
}

impl SwapGraph {
    pub fn n_chains(&self) -> usize {
        match *self {
            SwapGraph::Deo { n_chains, .. } => n_chains,
            SwapGraph::VariationalDeo {
                n_fixed,
                n_variational,
                ..
            } => n_fixed + n_variational,
        }
    }

    pub fn round(&self) -> usize {
        match *self {
            SwapGraph::Deo { round, .. } | SwapGraph::VariationalDeo { round, .. } => round,
        }
    }

    /// Partner of `chain` in this round; `chain` itself when unpaired.
    pub fn partner_chain(&self, chain: usize) -> usize {
        deo_partner(self.n_chains(), self.round(), chain)
    }

    /// Assert the involution property over every chain.
    pub fn validate(&self) -> Result<(), PtError> {
        for chain in 0..self.n_chains() {
            let partner = self.partner_chain(chain);
            if self.partner_chain(partner) != chain {
                return Err(PtError::InvolutionViolation {
                    round: self.round(),
                    chain,
                    partner,
                });
            }
        }
        Ok(())
    }
}

/// Rounds are counted from 1; odd rounds pair chain 0 upward, even
/// rounds start one interface later.
fn deo_partner(n_chains: usize, round: usize, chain: usize) -> usize {
    debug_assert!(chain < n_chains);
    let offset = if round % 2 == 1 { 0 } else { 1 };
    if chain < offset {
        return chain;
    }
    if (chain - offset) % 2 == 0 {
        // Lower side of an interface; pair upward if a partner exists.
        if chain + 1 < n_chains {
            chain + 1
        } else {
            chain
        }
    } else {
        chain - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partners(graph: &SwapGraph) -> Vec<usize> {
        (0..graph.n_chains()).map(|c| graph.partner_chain(c)).collect()
    }

    #[test]
    fn deo_four_chains_alternates() {
        // Round 1: (0,1) (2,3); round 2: 0 alone, (1,2), 3 alone.
        let r1 = SwapGraph::Deo {
            n_chains: 4,
            round: 1,
        };
        assert_eq!(partners(&r1), vec![1, 0, 3, 2]);

        let r2 = SwapGraph::Deo {
            n_chains: 4,
            round: 2,
        };
        assert_eq!(partners(&r2), vec![0, 2, 1, 3]);

        // Round 3 repeats round 1's pairing.
        let r3 = SwapGraph::Deo {
            n_chains: 4,
            round: 3,
        };
        assert_eq!(partners(&r3), partners(&r1));
    }

    #[test]
    fn deo_odd_chain_count_leaves_tail_unpaired() {
        let r1 = SwapGraph::Deo {
            n_chains: 5,
            round: 1,
        };
        assert_eq!(partners(&r1), vec![1, 0, 3, 2, 4]);

        let r2 = SwapGraph::Deo {
            n_chains: 5,
            round: 2,
        };
        assert_eq!(partners(&r2), vec![0, 2, 1, 4, 3]);
    }

    #[test]
    fn single_chain_is_always_self_paired() {
        for round in 1..5 {
            let g = SwapGraph::Deo { n_chains: 1, round };
            assert_eq!(g.partner_chain(0), 0);
            g.validate().unwrap();
        }
    }

    #[test]
    fn variational_fold_is_proposed_on_parity_cadence() {
        // Layout with n_fixed = 2, n_variational = 2:
        //   chain 0 = fixed ref, 1 = fixed target,
        //   chain 2 = variational target, 3 = variational ref.
        // The fold interface is (1,2), an even-round interface.
        let r1 = SwapGraph::VariationalDeo {
            n_fixed: 2,
            n_variational: 2,
            round: 1,
        };
        assert_eq!(partners(&r1), vec![1, 0, 3, 2]);

        let r2 = SwapGraph::VariationalDeo {
            n_fixed: 2,
            n_variational: 2,
            round: 2,
        };
        assert_eq!(partners(&r2), vec![0, 2, 1, 3]);
    }

    #[test]
    fn involution_holds_for_many_shapes() {
        for n in 1..12 {
            for round in 1..6 {
                SwapGraph::Deo { n_chains: n, round }.validate().unwrap();
            }
        }
        for nf in 1..6 {
            for nv in 1..6 {
                for round in 1..6 {
                    SwapGraph::VariationalDeo {
                        n_fixed: nf,
                        n_variational: nv,
                        round,
                    }
                    .validate()
                    .unwrap();
                }
            }
        }
    }

    #[test]
    fn every_round_graph_is_a_permutation() {
        for round in 1..8 {
            let g = SwapGraph::Deo {
                n_chains: 7,
                round,
            };
            let mut image: Vec<usize> = partners(&g);
            image.sort_unstable();
            assert_eq!(image, (0..7).collect::<Vec<_>>());
        }
    }
}
