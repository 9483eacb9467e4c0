use rand::Rng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256StarStar;
use rayon::prelude::*;

use crate::model::{Model, NormalPair};
use crate::replica::EntangledReplicas;
use crate::tempering::{LogPotential, Reference, Tempering};

/// Exploration kernel seam: advance one replica's state against its
/// current annealed log-potential. Pure side effect on the state; all
/// randomness comes from the replica's own RNG.
pub trait Explore<M: Model>: Sync + Clone {
    fn explore(
        &self,
        model: &M,
        potential: &LogPotential,
        state: &mut Vec<f64>,
        rng: &mut Xoshiro256StarStar,
    );
}

/// Random-walk Metropolis with full-vector normal proposals.
///
/// The reference chain (`beta == 0`) is refreshed with an exact
/// independent draw instead, which is what drives round trips through
/// the ladder.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    pub step_size: f64,
    pub n_passes: usize,
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self {
            step_size: 0.5,
            n_passes: 4,
        }
    }
}

impl<M: Model> Explore<M> for RandomWalk {
    fn explore(
        &self,
        model: &M,
        potential: &LogPotential,
        state: &mut Vec<f64>,
        rng: &mut Xoshiro256StarStar,
    ) {
        if potential.beta <= 0.0 {
            *state = potential.reference.sample(model, rng);
            return;
        }
        let step = Normal::new(0.0, self.step_size).expect("positive step size");
        let mut current = potential.log_density(model, state);
        let mut proposal = vec![0.0; state.len()];
        for _ in 0..self.n_passes {
            for (p, &x) in proposal.iter_mut().zip(state.iter()) {
                *p = x + step.sample(rng);
            }
            let proposed = potential.log_density(model, &proposal);
            if rng.gen::<f64>().ln() < proposed - current {
                state.copy_from_slice(&proposal);
                current = proposed;
            }
        }
    }
}

/// Exact iid sampler along normal-to-normal paths.
///
/// Annealing one diagonal normal into another keeps every intermediate
/// distribution normal, with per-coordinate precision
/// `(1-beta)/s0^2 + beta/s1^2`, so the chain can be sampled directly.
/// Used by the statistical tests, where exploration error would
/// otherwise swamp the swap statistics under test.
#[derive(Debug, Clone, Default)]
pub struct IidNormal;

impl Explore<NormalPair> for IidNormal {
    fn explore(
        &self,
        model: &NormalPair,
        potential: &LogPotential,
        state: &mut Vec<f64>,
        rng: &mut Xoshiro256StarStar,
    ) {
        let beta = potential.beta;
        for (d, x) in state.iter_mut().enumerate() {
            let (m0, s0) = match &potential.reference {
                Reference::Fixed => (model.ref_mean, model.ref_std),
                Reference::Gaussian(g) => (g.mean[d], g.std[d]),
            };
            let (m1, s1) = (model.target_mean, model.target_std);
            let precision = (1.0 - beta) / (s0 * s0) + beta / (s1 * s1);
            let mean = ((1.0 - beta) * m0 / (s0 * s0) + beta * m1 / (s1 * s1)) / precision;
            let std = precision.sqrt().recip();
            *x = Normal::new(mean, std).expect("positive std").sample(rng);
        }
    }
}

/// Advance every local replica between swap rounds, optionally in
/// parallel. The swap itself stays single-threaded; this is the only
/// multithreaded section of a round.
pub fn explore_all<M: Model, X: Explore<M>>(
    replicas: &mut EntangledReplicas<Vec<f64>>,
    tempering: &Tempering,
    model: &M,
    explorer: &X,
    multithreaded: bool,
) {
    let run = |replica: &mut crate::replica::Replica<Vec<f64>>| {
        let potential = tempering.find_log_potential(replica.chain);
        explorer.explore(model, &potential, &mut replica.state, &mut replica.rng);
    };
    if multithreaded {
        replicas.locals_mut().par_iter_mut().for_each(run);
    } else {
        replicas.locals_mut().iter_mut().for_each(run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn potential(beta: f64) -> LogPotential {
        LogPotential {
            reference: Reference::Fixed,
            beta,
        }
    }

    #[test]
    fn reference_chain_gets_an_exact_refresh() {
        let model = NormalPair::well_separated();
        let walker = RandomWalk::default();
        let mut state = vec![100.0];
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        walker.explore(&model, &potential(0.0), &mut state, &mut rng);

        let mut check_rng = Xoshiro256StarStar::seed_from_u64(3);
        assert_eq!(state, model.sample_reference(&mut check_rng));
    }

    #[test]
    fn random_walk_is_deterministic_per_seed() {
        let model = NormalPair::well_separated();
        let walker = RandomWalk::default();
        let mut a = vec![0.0];
        let mut b = vec![0.0];
        let mut rng_a = Xoshiro256StarStar::seed_from_u64(11);
        let mut rng_b = Xoshiro256StarStar::seed_from_u64(11);
        walker.explore(&model, &potential(0.7), &mut a, &mut rng_a);
        walker.explore(&model, &potential(0.7), &mut b, &mut rng_b);
        assert_eq!(a[0].to_bits(), b[0].to_bits());
    }

    #[test]
    fn random_walk_tracks_the_target() {
        // At beta = 1 the potential is N(3, 1); a long walk from the
        // far tail must settle around the target mean.
        let model = NormalPair::well_separated();
        let walker = RandomWalk {
            step_size: 1.0,
            n_passes: 1,
        };
        let mut state = vec![-5.0];
        let mut rng = Xoshiro256StarStar::seed_from_u64(17);
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let n = 4000;
        for _ in 0..500 {
            walker.explore(&model, &potential(1.0), &mut state, &mut rng);
        }
        for _ in 0..n {
            walker.explore(&model, &potential(1.0), &mut state, &mut rng);
            sum += state[0];
            sum_sq += state[0] * state[0];
        }
        let mean = sum / n as f64;
        let var = sum_sq / n as f64 - mean * mean;
        assert!((mean - 3.0).abs() < 0.3, "mean {mean}");
        assert!((var - 1.0).abs() < 0.5, "var {var}");
    }

    #[test]
    fn iid_normal_hits_the_interpolated_moments() {
        // Halfway between N(-3,1) and N(3,1) the annealed distribution
        // is exactly N(0,1).
        let model = NormalPair::well_separated();
        let sampler = IidNormal;
        let mut rng = Xoshiro256StarStar::seed_from_u64(23);
        let mut state = vec![0.0];
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let n = 4000;
        for _ in 0..n {
            sampler.explore(&model, &potential(0.5), &mut state, &mut rng);
            sum += state[0];
            sum_sq += state[0] * state[0];
        }
        let mean = sum / n as f64;
        let var = sum_sq / n as f64 - mean * mean;
        assert!(mean.abs() < 0.15, "mean {mean}");
        assert!((var - 1.0).abs() < 0.3, "var {var}");
    }

    #[test]
    fn iid_normal_endpoints_are_the_pair() {
        let model = NormalPair::well_separated();
        let sampler = IidNormal;
        let mut rng = Xoshiro256StarStar::seed_from_u64(29);
        let mut state = vec![0.0];
        let mut sum0 = 0.0;
        let mut sum1 = 0.0;
        let n = 2000;
        for _ in 0..n {
            sampler.explore(&model, &potential(0.0), &mut state, &mut rng);
            sum0 += state[0];
            sampler.explore(&model, &potential(1.0), &mut state, &mut rng);
            sum1 += state[0];
        }
        assert!((sum0 / n as f64 + 3.0).abs() < 0.2);
        assert!((sum1 / n as f64 - 3.0).abs() < 0.2);
    }
}
