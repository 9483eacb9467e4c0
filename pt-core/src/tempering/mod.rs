pub mod barrier;
pub mod indexer;
pub mod reference;
pub mod schedule;

pub use indexer::{ChainIndexer, Leg};
pub use reference::{GaussianReference, Reference};
pub use schedule::Schedule;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Model;
use crate::recorder::Recorder;
use crate::swap::graph::SwapGraph;
use crate::swap::pair::DefaultSwapper;

/// One annealed log-potential: the distribution of a single chain.
///
/// `log pi_beta = (1 - beta) * log reference + beta * log target`, with
/// the endpoints special-cased so an infinite log-density on the far
/// side cannot poison them with `0 * inf`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogPotential {
    pub reference: Reference,
    pub beta: f64,
}

impl LogPotential {
    pub fn log_density<M: Model>(&self, model: &M, state: &[f64]) -> f64 {
        if self.beta <= 0.0 {
            self.reference.log_density(model, state)
        } else if self.beta >= 1.0 {
            model.log_target(state)
        } else {
            (1.0 - self.beta) * self.reference.log_density(model, state)
                + self.beta * model.log_target(state)
        }
    }
}

/// One tempering leg: a schedule annealing a reference into the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonReversiblePt {
    pub schedule: Schedule,
    pub reference: Reference,
}

impl NonReversiblePt {
    pub fn new(n_chains: usize, reference: Reference) -> Self {
        Self {
            schedule: Schedule::equally_spaced(n_chains),
            reference,
        }
    }

    pub fn n_chains(&self) -> usize {
        self.schedule.len()
    }

    /// Log-potentials in leg-local order (reference first).
    pub fn log_potentials(&self) -> Vec<LogPotential> {
        self.schedule
            .betas
            .iter()
            .map(|&beta| LogPotential {
                reference: self.reference.clone(),
                beta,
            })
            .collect()
    }

    /// New leg with a rejection-equalized schedule; the reference is
    /// supplied by the caller (fixed legs keep theirs, variational legs
    /// refit).
    fn adapt(&self, mean_rejections: &[f64], reference: Reference) -> Self {
        let knots = barrier::cumulative_barrier(&self.schedule.betas, mean_rejections);
        Self {
            schedule: Schedule::from_cumulative_barrier(&knots, self.n_chains()),
            reference,
        }
    }
}

/// The tempering container: an immutable per-round snapshot owning the
/// schedules, references and the swap-graph family. Adaptation builds
/// the next round's snapshot from the merged recorders; nothing here
/// mutates within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tempering {
    Single(NonReversiblePt),
    Variational {
        fixed: NonReversiblePt,
        variational: NonReversiblePt,
    },
}

impl Tempering {
    /// A single fixed-reference ladder of `n_chains` chains.
    pub fn single(n_chains: usize) -> Self {
        Tempering::Single(NonReversiblePt::new(n_chains, Reference::Fixed))
    }

    /// The stabilized two-leg ladder: a fixed leg and a variational leg
    /// whose learned reference starts as a standard normal.
    pub fn variational(n_fixed: usize, n_variational: usize, dim: usize) -> Self {
        Tempering::Variational {
            fixed: NonReversiblePt::new(n_fixed, Reference::Fixed),
            variational: NonReversiblePt::new(
                n_variational,
                Reference::Gaussian(GaussianReference::standard(dim)),
            ),
        }
    }

    pub fn n_chains(&self) -> usize {
        match self {
            Tempering::Single(leg) => leg.n_chains(),
            Tempering::Variational { fixed, variational } => {
                fixed.n_chains() + variational.n_chains()
            }
        }
    }

    pub fn indexer(&self) -> ChainIndexer {
        match self {
            Tempering::Single(leg) => ChainIndexer {
                n_fixed: leg.n_chains(),
                n_variational: 0,
            },
            Tempering::Variational { fixed, variational } => ChainIndexer {
                n_fixed: fixed.n_chains(),
                n_variational: variational.n_chains(),
            },
        }
    }

    /// The swap graph for `round`.
    pub fn swap_graph(&self, round: usize) -> SwapGraph {
        match self {
            Tempering::Single(leg) => SwapGraph::Deo {
                n_chains: leg.n_chains(),
                round,
            },
            Tempering::Variational { fixed, variational } => SwapGraph::VariationalDeo {
                n_fixed: fixed.n_chains(),
                n_variational: variational.n_chains(),
                round,
            },
        }
    }

    /// Log-potentials in global chain order. For the two-leg container
    /// this is the fixed leg followed by the variational leg reversed,
    /// giving the reflected layout `ref..target | target..ref`.
    pub fn log_potentials(&self) -> Vec<LogPotential> {
        match self {
            Tempering::Single(leg) => leg.log_potentials(),
            Tempering::Variational { fixed, variational } => {
                let mut pots = fixed.log_potentials();
                let mut var = variational.log_potentials();
                var.reverse();
                pots.extend(var);
                pots
            }
        }
    }

    /// Resolve one chain's log-potential through the indexer.
    pub fn find_log_potential(&self, chain: usize) -> LogPotential {
        let (leg_tag, local) = self.indexer().leg_of(chain);
        let leg = match (self, leg_tag) {
            (Tempering::Single(leg), _) => leg,
            (Tempering::Variational { fixed, .. }, Leg::Fixed) => fixed,
            (Tempering::Variational { variational, .. }, Leg::Variational) => variational,
        };
        LogPotential {
            reference: leg.reference.clone(),
            beta: leg.schedule.betas[local],
        }
    }

    /// Chains sitting exactly at the target (`beta == 1`); their states
    /// feed the variational moment fit.
    pub fn target_chains(&self) -> Vec<usize> {
        match self {
            Tempering::Single(leg) => vec![leg.n_chains() - 1],
            Tempering::Variational { fixed, .. } => {
                vec![fixed.n_chains() - 1, fixed.n_chains()]
            }
        }
    }

    /// The default pair swapper over this snapshot's log-potentials.
    pub fn create_pair_swapper<'a, M: Model>(&self, model: &'a M) -> DefaultSwapper<'a, M> {
        DefaultSwapper::new(model, self.log_potentials())
    }

    /// Mean rejection per global interface from a merged recorder.
    fn mean_rejections(&self, merged: &Recorder) -> Vec<f64> {
        (0..self.n_chains() - 1).map(|i| merged.mean_rejection(i)).collect()
    }

    /// Scalar barrier of the fixed leg (or the only leg).
    pub fn global_barrier(&self, merged: &Recorder) -> f64 {
        let rej = self.mean_rejections(merged);
        match self {
            Tempering::Single(_) => barrier::global_barrier(&rej),
            Tempering::Variational { fixed, .. } => {
                barrier::global_barrier(&rej[..fixed.n_chains() - 1])
            }
        }
    }

    /// Scalar barrier of the variational leg; zero for a single ladder.
    pub fn global_barrier_variational(&self, merged: &Recorder) -> f64 {
        match self {
            Tempering::Single(_) => 0.0,
            Tempering::Variational { variational, .. } => {
                let var_rej = self.variational_leg_rejections(merged);
                debug_assert_eq!(var_rej.len(), variational.n_chains() - 1);
                barrier::global_barrier(&var_rej)
            }
        }
    }

    /// Variational-leg mean rejections in leg-local interface order
    /// (reference end first). Local interface `j` is global interface
    /// `n_total - 2 - j` under the reflected layout.
    fn variational_leg_rejections(&self, merged: &Recorder) -> Vec<f64> {
        match self {
            Tempering::Single(_) => Vec::new(),
            Tempering::Variational { variational, .. } => {
                let n_total = self.n_chains();
                (0..variational.n_chains() - 1)
                    .map(|j| merged.mean_rejection(n_total - 2 - j))
                    .collect()
            }
        }
    }

    /// Build the next round's snapshot: rejection-equalized schedules
    /// per leg, variational reference refit from the accumulated target
    /// moments. Pure in the merged recorder and `self`.
    pub fn adapt(&self, merged: &Recorder) -> Tempering {
        match self {
            Tempering::Single(leg) => {
                let rej = self.mean_rejections(merged);
                let next = leg.adapt(&rej, leg.reference.clone());
                debug!(
                    barrier = barrier::global_barrier(&rej),
                    n_chains = leg.n_chains(),
                    "adapted schedule"
                );
                Tempering::Single(next)
            }
            Tempering::Variational { fixed, variational } => {
                let rej = self.mean_rejections(merged);
                let fixed_rej = &rej[..fixed.n_chains() - 1];
                let var_rej = self.variational_leg_rejections(merged);

                let reference = GaussianReference::from_moments(&merged.moments)
                    .map(Reference::Gaussian)
                    .unwrap_or_else(|| variational.reference.clone());

                debug!(
                    barrier = barrier::global_barrier(fixed_rej),
                    barrier_variational = barrier::global_barrier(&var_rej),
                    "adapted two-leg schedules"
                );
                Tempering::Variational {
                    fixed: fixed.adapt(fixed_rej, fixed.reference.clone()),
                    variational: variational.adapt(&var_rej, reference),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormalPair;

    #[test]
    fn concatenated_potentials_are_symmetric_across_the_fold() {
        // Two legs of five chains over a trivial Gaussian path: the
        // ten-long beta vector must mirror around the fold.
        let tempering = Tempering::variational(5, 5, 1);
        let pots = tempering.log_potentials();
        assert_eq!(pots.len(), 10);
        for i in 0..10 {
            assert_eq!(pots[i].beta, pots[9 - i].beta);
        }
        // Both target chains sit at beta 1, both ends at beta 0.
        assert_eq!(pots[4].beta, 1.0);
        assert_eq!(pots[5].beta, 1.0);
        assert_eq!(pots[0].beta, 0.0);
        assert_eq!(pots[9].beta, 0.0);
    }

    #[test]
    fn find_log_potential_agrees_with_concatenation() {
        let tempering = Tempering::variational(3, 4, 2);
        let pots = tempering.log_potentials();
        for chain in 0..tempering.n_chains() {
            let found = tempering.find_log_potential(chain);
            assert_eq!(found.beta, pots[chain].beta, "chain {chain}");
            assert_eq!(found.reference, pots[chain].reference);
        }
    }

    #[test]
    fn single_ladder_potentials_interpolate_the_pair() {
        let tempering = Tempering::single(3);
        let model = NormalPair::well_separated();
        let pots = tempering.log_potentials();
        let state = vec![0.5];
        let expect_mid =
            0.5 * model.log_reference(&state) + 0.5 * model.log_target(&state);
        assert_eq!(pots[0].log_density(&model, &state), model.log_reference(&state));
        assert!((pots[1].log_density(&model, &state) - expect_mid).abs() < 1e-12);
        assert_eq!(pots[2].log_density(&model, &state), model.log_target(&state));
    }

    #[test]
    fn endpoint_potentials_ignore_the_far_side() {
        // At beta = 0 an infinitely bad target must not produce NaN.
        let pot = LogPotential {
            reference: Reference::Fixed,
            beta: 0.0,
        };
        let model = crate::model::UnidentifiableProduct::new(10, 5);
        let inside = vec![0.5, 0.0]; // target density zero here (p = 0)
        assert_eq!(pot.log_density(&model, &inside), 0.0);
    }

    #[test]
    fn target_chains_flank_the_fold() {
        assert_eq!(Tempering::single(8).target_chains(), vec![7]);
        assert_eq!(Tempering::variational(5, 5, 1).target_chains(), vec![4, 5]);
    }

    #[test]
    fn adapt_preserves_shape_and_pins_endpoints() {
        let tempering = Tempering::variational(4, 3, 1);
        let mut merged = Recorder::new(tempering.n_chains() - 1);
        for i in 0..tempering.n_chains() - 1 {
            merged.record_swap(i, 0.5);
        }
        merged.record_moments(&[2.0]);
        merged.record_moments(&[4.0]);

        let next = tempering.adapt(&merged);
        assert_eq!(next.n_chains(), 7);
        match &next {
            Tempering::Variational { fixed, variational } => {
                assert_eq!(fixed.schedule.betas.first(), Some(&0.0));
                assert_eq!(fixed.schedule.betas.last(), Some(&1.0));
                assert_eq!(variational.schedule.betas.first(), Some(&0.0));
                assert_eq!(variational.schedule.betas.last(), Some(&1.0));
                // Reference refit to the recorded moments: mean 3.
                match &variational.reference {
                    Reference::Gaussian(g) => assert!((g.mean[0] - 3.0).abs() < 1e-12),
                    other => panic!("expected Gaussian reference, got {other:?}"),
                }
            }
            other => panic!("adapt changed the container kind: {other:?}"),
        }
    }

    #[test]
    fn uniform_rejections_keep_equal_spacing() {
        let tempering = Tempering::single(5);
        let mut merged = Recorder::new(4);
        for i in 0..4 {
            merged.record_swap(i, 0.75);
        }
        let next = tempering.adapt(&merged);
        match next {
            Tempering::Single(leg) => {
                for (b, expect) in leg.schedule.betas.iter().zip([0.0, 0.25, 0.5, 0.75, 1.0]) {
                    assert!((b - expect).abs() < 1e-12);
                }
            }
            other => panic!("unexpected container {other:?}"),
        }
    }

    #[test]
    fn barriers_split_by_leg() {
        let tempering = Tempering::variational(3, 3, 1);
        // Global interfaces: 0,1 fixed leg; 2 fold; 3,4 variational leg.
        let mut merged = Recorder::new(5);
        merged.record_swap(0, 0.9); // rejection 0.1
        merged.record_swap(1, 0.8); // rejection 0.2
        merged.record_swap(2, 1.0); // fold, rejection 0
        merged.record_swap(3, 0.6); // rejection 0.4
        merged.record_swap(4, 0.5); // rejection 0.5
        let fixed = tempering.global_barrier(&merged);
        let variational = tempering.global_barrier_variational(&merged);
        assert!((fixed - 0.3).abs() < 1e-12);
        assert!((variational - 0.9).abs() < 1e-12);
    }
}
