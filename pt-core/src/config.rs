use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Which per-replica statistics sinks the run builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderKind {
    /// Per-interface swap rejection statistics; adaptation needs these.
    InterfaceRejections,
    /// Target-chain state moments, feeding the variational reference.
    TargetMoments,
}

impl TryFrom<&str> for RecorderKind {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "interface_rejections" => Ok(Self::InterfaceRejections),
            "target_moments" => Ok(Self::TargetMoments),
            _ => Err(format!(
                "unknown recorder '{s}', expected 'interface_rejections' or 'target_moments'"
            )),
        }
    }
}

fn validate_run_config(cfg: &RunConfig) -> Result<(), ValidationError> {
    if cfg.n_chains < 2 {
        return Err(ValidationError::new("n_chains must be >= 2"));
    }
    if cfg.n_chains_variational == 1 {
        return Err(ValidationError::new(
            "n_chains_variational must be 0 or >= 2",
        ));
    }
    if cfg.n_rounds < 1 {
        return Err(ValidationError::new("n_rounds must be >= 1"));
    }
    if cfg.checked_round > cfg.n_rounds {
        return Err(ValidationError::new("checked_round must be <= n_rounds"));
    }
    if !cfg.recorders.contains(&RecorderKind::InterfaceRejections) {
        return Err(ValidationError::new(
            "the interface_rejections recorder cannot be disabled",
        ));
    }
    Ok(())
}

/// Run options recognized by the engine.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[validate(schema(function = "validate_run_config"))]
pub struct RunConfig {
    /// Master seed; every replica RNG derives from `(seed, chain)`.
    pub seed: u64,
    pub n_rounds: usize,
    /// Chains on the fixed leg.
    pub n_chains: usize,
    /// Chains on the variational leg; 0 disables the second leg.
    pub n_chains_variational: usize,
    /// Snapshot engine state at round boundaries.
    pub checkpoint: bool,
    /// Re-check this round against a single-process replay; 0 disables.
    pub checked_round: usize,
    /// Run explorers in parallel over local replicas.
    pub multithreaded: bool,
    pub recorders: Vec<RecorderKind>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            n_rounds: 10,
            n_chains: 10,
            n_chains_variational: 0,
            checkpoint: false,
            checked_round: 0,
            multithreaded: false,
            recorders: vec![
                RecorderKind::InterfaceRejections,
                RecorderKind::TargetMoments,
            ],
        }
    }
}

impl RunConfig {
    /// Total chains across both legs.
    pub fn n_chains_total(&self) -> usize {
        self.n_chains + self.n_chains_variational
    }

    pub fn record_moments(&self) -> bool {
        self.recorders.contains(&RecorderKind::TargetMoments)
    }
}
