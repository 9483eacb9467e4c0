//! Error types for the tempering engine.

use std::fmt;

/// Errors produced by the swap subsystem and its collectives.
///
/// NaN log-ratios are deliberately absent: a degenerate swap statistic is
/// treated as a rejection and counted in the recorder, not surfaced as an
/// error.
#[derive(Debug, thiserror::Error)]
pub enum PtError {
    /// A collective received destination indices that do not form a
    /// permutation of the global index space.
    #[error("permutation violation in round {round}: {detail}")]
    PermutationViolation { round: usize, detail: String },

    /// A swap graph paired some chain with a partner that does not pair
    /// back. Programmer error in the graph construction.
    #[error("involution violation in round {round}: partner({chain}) = {partner}, partner({partner}) != {chain}")]
    InvolutionViolation {
        round: usize,
        chain: usize,
        partner: usize,
    },

    /// The two sides of a swap computed different accept booleans, or a
    /// checked round diverged from its single-process replay. Indicates
    /// RNG drift or a non-deterministic log-density.
    #[error("swap decision disagreement in round {round}: {detail}")]
    DecisionDisagreement { round: usize, detail: String },

    /// Underlying transport failure. The round is lost; not retried.
    #[error("communication failed: {0}")]
    Communication(String),

    /// Rejected run configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A checkpoint blob could not be encoded or decoded.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

impl PtError {
    /// Convenience constructor for transport errors.
    pub fn comm(msg: impl fmt::Display) -> Self {
        Self::Communication(msg.to_string())
    }

    /// Convenience constructor for configuration errors.
    pub fn config(msg: impl fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }
}
