pub mod graph;
pub mod pair;

pub use graph::SwapGraph;
pub use pair::{swap_acceptance, swap_decision, DefaultSwapper, PairSwapper, SwapStat, TestSwapper};

use crate::error::PtError;
use crate::replica::EntangledReplicas;

/// Local record of one swap round, used by diagnostics and by the
/// checked-round replay. One entry per local slot, in slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrace {
    pub chains_before: Vec<usize>,
    pub stats: Vec<SwapStat>,
    pub chains_after: Vec<usize>,
}

/// Execute one swap round: the engine's entry point.
///
/// The round is three collectives around purely local work:
///
/// 1. partner chains from the swap graph (local),
/// 2. partner chains resolved to global replica slots (`permuted_get`),
/// 3. sufficient statistics, one per replica (local),
/// 4. statistics exchanged with partners (`transmit`),
/// 5. the symmetric decision applied to each side's own `chain` field
///    (local; statistics recorded on the lower-chain side only),
/// 6. the chain mapping rebuilt (`permuted_set`), which doubles as the
///    post-round assertion that the chains still form a permutation.
///
/// Replica states never cross the network; only annealing indices and
/// the two-double statistics do.
pub fn swap<S, P: PairSwapper<S>>(
    swapper: &P,
    replicas: &mut EntangledReplicas<S>,
    graph: &SwapGraph,
) -> Result<RoundTrace, PtError> {
    if graph.n_chains() != replicas.n_chains() {
        return Err(PtError::config(format!(
            "swap graph spans {} chains but the store holds {}",
            graph.n_chains(),
            replicas.n_chains()
        )));
    }
    graph.validate()?;
    let round = graph.round();
    replicas.begin_round(round);

    let partner_chains: Vec<usize> = replicas
        .locals()
        .map(|r| graph.partner_chain(r.chain))
        .collect();
    let chains_before: Vec<usize> = replicas.locals().map(|r| r.chain).collect();

    let partner_slots = replicas.resolve_chains(&partner_chains)?;

    // Every replica computes its statistic before any decision runs,
    // self-pairs included, so RNG consumption is the same under every
    // partition.
    let mut my_stats = Vec::with_capacity(partner_chains.len());
    {
        let locals = replicas.locals_mut();
        for (replica, &partner) in locals.iter_mut().zip(partner_chains.iter()) {
            my_stats.push(swapper.swap_stat(replica, partner));
        }
    }

    let partner_stats = replicas.entangler().transmit(&my_stats, &partner_slots)?;

    {
        let locals = replicas.locals_mut();
        for i in 0..locals.len() {
            let c1 = locals[i].chain;
            let c2 = partner_chains[i];
            if c1 == c2 {
                continue;
            }
            let s1 = my_stats[i];
            let s2 = partner_stats[i];
            let accept = swapper.swap_decision(c1, &s1, c2, &s2);
            let partner_view = swapper.swap_decision(c2, &s2, c1, &s1);
            if accept != partner_view {
                return Err(PtError::DecisionDisagreement {
                    round,
                    detail: format!(
                        "chains {c1} and {c2} decided {accept} vs {partner_view}"
                    ),
                });
            }
            if c1 < c2 {
                swapper.record_swap_stats(&mut locals[i].recorder, c1, &s1, c2, &s2);
            }
            if accept {
                locals[i].chain = c2;
            }
        }
    }

    replicas.rebuild_mapping()?;
    let chains_after = replicas.locals().map(|r| r.chain).collect();
    Ok(RoundTrace {
        chains_before,
        stats: my_stats,
        chains_after,
    })
}
