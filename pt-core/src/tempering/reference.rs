use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

use crate::model::{normal_log_density_varying, Model};
use crate::recorder::MomentAccum;

/// The distribution at the cold end of a leg's schedule.
///
/// A leg either anneals from the model's own fixed reference or from a
/// learned diagonal-Gaussian approximation of the target. The set is
/// closed; dispatch is a match, not a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reference {
    Fixed,
    Gaussian(GaussianReference),
}

impl Reference {
    pub fn log_density<M: Model>(&self, model: &M, state: &[f64]) -> f64 {
        match self {
            Reference::Fixed => model.log_reference(state),
            Reference::Gaussian(g) => g.log_density(state),
        }
    }

    /// Draw an exact sample, used for reference-chain refreshes.
    pub fn sample<M: Model>(&self, model: &M, rng: &mut Xoshiro256StarStar) -> Vec<f64> {
        match self {
            Reference::Fixed => model.sample_reference(rng),
            Reference::Gaussian(g) => g.sample(rng),
        }
    }
}

/// Diagonal-normal variational reference, moment-matched to the target
/// states the recorders have seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianReference {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl GaussianReference {
    pub fn standard(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            std: vec![1.0; dim],
        }
    }

    /// Moment-match to accumulated target samples. Returns `None` when
    /// the accumulator is empty so the caller keeps the previous fit.
    pub fn from_moments(moments: &MomentAccum) -> Option<Self> {
        Some(Self {
            mean: moments.mean()?,
            std: moments.std()?,
        })
    }

    pub fn log_density(&self, state: &[f64]) -> f64 {
        normal_log_density_varying(state, &self.mean, &self.std)
    }

    pub fn sample(&self, rng: &mut Xoshiro256StarStar) -> Vec<f64> {
        self.mean
            .iter()
            .zip(self.std.iter())
            .map(|(&m, &s)| Normal::new(m, s).expect("positive std").sample(rng))
            .collect()
    }
}
