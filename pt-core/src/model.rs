use rand::Rng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256StarStar;

/// A target distribution together with its fixed reference.
///
/// The engine treats states as opaque apart from this interface: it
/// evaluates the two log-densities and draws fresh reference samples for
/// initialization and reference-chain refreshes. Both callables must be
/// deterministic functions of the state.
pub trait Model: Sync {
    fn dim(&self) -> usize;

    /// Log-density of the reference distribution (chain at beta = 0).
    fn log_reference(&self, state: &[f64]) -> f64;

    /// Log-density of the target distribution (chain at beta = 1).
    fn log_target(&self, state: &[f64]) -> f64;

    /// Exact draw from the reference.
    fn sample_reference(&self, rng: &mut Xoshiro256StarStar) -> Vec<f64>;
}

pub(crate) const LOG_2PI: f64 = 1.8378770664093453;

/// Log-density of an isotropic-coordinate normal.
pub(crate) fn normal_log_density(x: &[f64], mean: f64, std: f64) -> f64 {
    let mut acc = 0.0;
    for &xi in x {
        let z = (xi - mean) / std;
        acc += -0.5 * z * z - std.ln() - 0.5 * LOG_2PI;
    }
    acc
}

/// Log-density of a diagonal normal with per-coordinate parameters.
pub(crate) fn normal_log_density_varying(x: &[f64], mean: &[f64], std: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), mean.len());
    debug_assert_eq!(x.len(), std.len());
    let mut acc = 0.0;
    for ((&xi, &m), &s) in x.iter().zip(mean.iter()).zip(std.iter()) {
        let z = (xi - m) / s;
        acc += -0.5 * z * z - s.ln() - 0.5 * LOG_2PI;
    }
    acc
}

/// Normal reference annealed into a normal target, the classic mode
/// separation benchmark (reference N(mu0, s0), target N(mu1, s1), each
/// coordinate independent).
#[derive(Debug, Clone)]
pub struct NormalPair {
    pub ref_mean: f64,
    pub ref_std: f64,
    pub target_mean: f64,
    pub target_std: f64,
    pub dim: usize,
}

impl NormalPair {
    /// The univariate N(-3,1) -> N(3,1) pair.
    pub fn well_separated() -> Self {
        Self {
            ref_mean: -3.0,
            ref_std: 1.0,
            target_mean: 3.0,
            target_std: 1.0,
            dim: 1,
        }
    }

    /// Reference equal to target: a zero-barrier sanity model.
    pub fn trivial(dim: usize) -> Self {
        Self {
            ref_mean: 0.0,
            ref_std: 1.0,
            target_mean: 0.0,
            target_std: 1.0,
            dim,
        }
    }
}

impl Model for NormalPair {
    fn dim(&self) -> usize {
        self.dim
    }

    fn log_reference(&self, state: &[f64]) -> f64 {
        normal_log_density(state, self.ref_mean, self.ref_std)
    }

    fn log_target(&self, state: &[f64]) -> f64 {
        normal_log_density(state, self.target_mean, self.target_std)
    }

    fn sample_reference(&self, rng: &mut Xoshiro256StarStar) -> Vec<f64> {
        let normal = Normal::new(self.ref_mean, self.ref_std).expect("positive std");
        (0..self.dim).map(|_| normal.sample(rng)).collect()
    }
}

/// Unidentifiable coin-flip product model: `successes` heads out of
/// `trials` with head probability `p1 * p2`, uniform reference on the
/// unit square. Only the product is identified, so the posterior is a
/// ridge and tempering has to cross it.
#[derive(Debug, Clone)]
pub struct UnidentifiableProduct {
    pub trials: u64,
    pub successes: u64,
}

impl UnidentifiableProduct {
    pub fn new(trials: u64, successes: u64) -> Self {
        assert!(successes <= trials);
        Self { trials, successes }
    }
}

impl Model for UnidentifiableProduct {
    fn dim(&self) -> usize {
        2
    }

    fn log_reference(&self, state: &[f64]) -> f64 {
        if state.iter().all(|&p| (0.0..=1.0).contains(&p)) {
            0.0
        } else {
            f64::NEG_INFINITY
        }
    }

    fn log_target(&self, state: &[f64]) -> f64 {
        if !state.iter().all(|&p| (0.0..=1.0).contains(&p)) {
            return f64::NEG_INFINITY;
        }
        let p = state[0] * state[1];
        let y = self.successes as f64;
        let n = self.trials as f64;
        // Bernoulli likelihood; binomial coefficient dropped as constant.
        let head = if y > 0.0 { y * p.ln() } else { 0.0 };
        let tail = if n - y > 0.0 { (n - y) * (1.0 - p).ln() } else { 0.0 };
        head + tail
    }

    fn sample_reference(&self, rng: &mut Xoshiro256StarStar) -> Vec<f64> {
        vec![rng.gen::<f64>(), rng.gen::<f64>()]
    }
}
