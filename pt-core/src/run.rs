use tracing::warn;
use validator::Validate;

use crate::checkpoint::{Checkpoint, ReplicaSnapshot};
use crate::comm::Communicator;
use crate::config::RunConfig;
use crate::error::PtError;
use crate::explore::{explore_all, Explore};
use crate::model::Model;
use crate::recorder::{merge_by_chain, Recorder};
use crate::replica::EntangledReplicas;
use crate::swap::{swap, RoundTrace};
use crate::tempering::Tempering;

/// Scalar diagnostics reported after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub rounds: usize,
    /// Annealing parameters in global chain order (both legs).
    pub schedule: Vec<f64>,
    /// Cumulative mean rejection per global interface.
    pub rejection_rates: Vec<f64>,
    pub barrier: f64,
    pub barrier_variational: f64,
    pub nan_count: u64,
}

/// The per-process driver: owns the config, the model, one explorer,
/// the current tempering snapshot and this rank's replica shard.
///
/// A round is explore, swap, merge recorders, adapt. All processes run
/// the same sequence of collectives in lockstep; everything else is
/// local. Construction is collective, as is every `advance_round`.
pub struct Engine<M: Model + Clone, X: Explore<M> + Clone> {
    config: RunConfig,
    model: M,
    explorer: X,
    tempering: Tempering,
    replicas: EntangledReplicas<Vec<f64>>,
    cumulative: Recorder,
    round: usize,
    latest_checkpoint: Option<Checkpoint>,
}

impl<M: Model + Clone, X: Explore<M> + Clone> Engine<M, X> {
    pub fn new(
        model: M,
        explorer: X,
        config: RunConfig,
        comm: Communicator,
    ) -> Result<Self, PtError> {
        config
            .validate()
            .map_err(|e| PtError::config(e.to_string()))?;
        let n_total = config.n_chains_total();
        let tempering = if config.n_chains_variational > 0 {
            Tempering::variational(config.n_chains, config.n_chains_variational, model.dim())
        } else {
            Tempering::single(config.n_chains)
        };
        let replicas = EntangledReplicas::new(n_total, comm, config.seed, n_total - 1, |rng| {
            model.sample_reference(rng)
        });
        let cumulative = Recorder::new(n_total - 1);
        Ok(Self {
            config,
            model,
            explorer,
            tempering,
            replicas,
            cumulative,
            round: 0,
            latest_checkpoint: None,
        })
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn tempering(&self) -> &Tempering {
        &self.tempering
    }

    pub fn replicas(&self) -> &EntangledReplicas<Vec<f64>> {
        &self.replicas
    }

    pub fn replicas_mut(&mut self) -> &mut EntangledReplicas<Vec<f64>> {
        &mut self.replicas
    }

    /// Full `chain -> slot` permutation, gathered to every rank.
    pub fn gather_permutation(&self) -> Result<Vec<u64>, PtError> {
        self.replicas.gather_permutation()
    }

    /// Execute `config.n_rounds` further rounds.
    pub fn run(&mut self) -> Result<RunSummary, PtError> {
        self.run_rounds(self.config.n_rounds)
    }

    /// Execute `n` further rounds. Running `n` then `m` rounds is
    /// observationally identical to running `n + m`.
    pub fn run_rounds(&mut self, n: usize) -> Result<RunSummary, PtError> {
        for _ in 0..n {
            self.advance_round()?;
        }
        Ok(self.summary())
    }

    /// One full round: explore, record target moments, swap, optionally
    /// cross-check, merge recorders and adapt the tempering.
    pub fn advance_round(&mut self) -> Result<RoundTrace, PtError> {
        self.round += 1;
        let round = self.round;
        let n_interfaces = self.config.n_chains_total() - 1;

        explore_all(
            &mut self.replicas,
            &self.tempering,
            &self.model,
            &self.explorer,
            self.config.multithreaded,
        );

        if self.config.record_moments() {
            let targets = self.tempering.target_chains();
            for replica in self.replicas.locals_mut() {
                if targets.contains(&replica.chain) {
                    replica.recorder.record_moments(&replica.state);
                }
            }
        }

        let graph = self.tempering.swap_graph(round);
        let trace = {
            let swapper = self.tempering.create_pair_swapper(&self.model);
            swap(&swapper, &mut self.replicas, &graph)?
        };

        if round == self.config.checked_round {
            self.check_round(round, &trace)?;
        }

        // Merge this round's recorders across all replicas, in chain
        // order, so the fold is identical under every partition.
        let local: Vec<(usize, Recorder)> = self
            .replicas
            .locals()
            .map(|r| (r.chain, r.recorder.clone()))
            .collect();
        let bytes =
            serde_json::to_vec(&local).map_err(|e| PtError::comm(format!("encode recorders: {e}")))?;
        let gathered = self.replicas.entangler().all_gather(bytes)?;
        let mut pairs = Vec::new();
        for blob in gathered {
            let mut part: Vec<(usize, Recorder)> = serde_json::from_slice(&blob)
                .map_err(|e| PtError::comm(format!("decode recorders: {e}")))?;
            pairs.append(&mut part);
        }
        let merged = merge_by_chain(n_interfaces, pairs);
        if merged.nan_count > 0 {
            warn!(
                round,
                nan_count = merged.nan_count,
                "degenerate swap statistics treated as rejections"
            );
        }
        self.cumulative.merge_from(&merged);
        for replica in self.replicas.locals_mut() {
            replica.recorder = Recorder::new(n_interfaces);
        }

        self.tempering = self.tempering.adapt(&self.cumulative);

        if self.config.checkpoint {
            self.latest_checkpoint = Some(self.checkpoint());
        }
        Ok(trace)
    }

    /// Re-run rounds `1..=round` in a fresh single-process engine and
    /// compare the checked round's gathered statistics bit for bit.
    /// Any divergence means some replica's RNG or log-density drifted
    /// from the deterministic stream.
    fn check_round(&self, round: usize, trace: &RoundTrace) -> Result<(), PtError> {
        let observed = self.gather_trace(trace)?;

        let mut shadow_config = self.config.clone();
        shadow_config.checked_round = 0;
        shadow_config.checkpoint = false;
        shadow_config.multithreaded = false;
        let mut shadow = Engine::new(
            self.model.clone(),
            self.explorer.clone(),
            shadow_config,
            Communicator::Solo,
        )?;
        let mut last = None;
        for _ in 0..round {
            last = Some(shadow.advance_round()?);
        }
        let reference = shadow
            .gather_trace(&last.expect("round >= 1"))
            .expect("solo gather cannot fail");

        if observed.len() != reference.len() {
            return Err(PtError::DecisionDisagreement {
                round,
                detail: format!(
                    "checked round saw {} slots, replay saw {}",
                    observed.len(),
                    reference.len()
                ),
            });
        }
        for (slot, (got, want)) in observed.iter().zip(reference.iter()).enumerate() {
            if got != want {
                return Err(PtError::DecisionDisagreement {
                    round,
                    detail: format!(
                        "slot {slot} diverged from single-process replay: \
                         {got:?} vs {want:?}"
                    ),
                });
            }
        }
        Ok(())
    }

    /// Gather a round trace to every rank: per global slot, the chains
    /// before/after and the raw bits of the swap statistic.
    fn gather_trace(&self, trace: &RoundTrace) -> Result<Vec<[u64; 4]>, PtError> {
        let mut bytes = Vec::with_capacity(trace.stats.len() * 32);
        for i in 0..trace.stats.len() {
            bytes.extend_from_slice(&(trace.chains_before[i] as u64).to_le_bytes());
            bytes.extend_from_slice(&(trace.chains_after[i] as u64).to_le_bytes());
            bytes.extend_from_slice(&trace.stats[i].log_ratio.to_bits().to_le_bytes());
            bytes.extend_from_slice(&trace.stats[i].uniform.to_bits().to_le_bytes());
        }
        let gathered = self.replicas.entangler().all_gather(bytes)?;
        let mut rows = Vec::new();
        for blob in gathered {
            for chunk in blob.chunks_exact(32) {
                rows.push([
                    u64::from_le_bytes(chunk[0..8].try_into().unwrap()),
                    u64::from_le_bytes(chunk[8..16].try_into().unwrap()),
                    u64::from_le_bytes(chunk[16..24].try_into().unwrap()),
                    u64::from_le_bytes(chunk[24..32].try_into().unwrap()),
                ]);
            }
        }
        Ok(rows)
    }

    pub fn summary(&self) -> RunSummary {
        let n_interfaces = self.config.n_chains_total() - 1;
        RunSummary {
            rounds: self.round,
            schedule: self
                .tempering
                .log_potentials()
                .iter()
                .map(|p| p.beta)
                .collect(),
            rejection_rates: (0..n_interfaces)
                .map(|i| self.cumulative.mean_rejection(i))
                .collect(),
            barrier: self.tempering.global_barrier(&self.cumulative),
            barrier_variational: self.tempering.global_barrier_variational(&self.cumulative),
            nan_count: self.cumulative.nan_count,
        }
    }

    pub fn global_barrier(&self) -> f64 {
        self.tempering.global_barrier(&self.cumulative)
    }

    pub fn global_barrier_variational(&self) -> f64 {
        self.tempering.global_barrier_variational(&self.cumulative)
    }

    /// Snapshot this rank's shard at the current round boundary.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            round: self.round as u64,
            config: self.config.clone(),
            tempering: self.tempering.clone(),
            cumulative: self.cumulative.clone(),
            replicas: self
                .replicas
                .locals()
                .map(|r| ReplicaSnapshot {
                    chain: r.chain as u64,
                    state: r.state.clone(),
                    rng: r.rng.clone(),
                    recorder: r.recorder.clone(),
                })
                .collect(),
        }
    }

    /// Latest automatic snapshot, present when `config.checkpoint` is
    /// set.
    pub fn latest_checkpoint(&self) -> Option<&Checkpoint> {
        self.latest_checkpoint.as_ref()
    }

    /// Rebuild an engine from a snapshot. Collective: every rank must
    /// restore its own shard from the same run's checkpoint. The next
    /// round reproduces the uninterrupted run bit for bit.
    pub fn restore(
        model: M,
        explorer: X,
        comm: Communicator,
        checkpoint: Checkpoint,
    ) -> Result<Self, PtError> {
        let mut engine = Engine::new(model, explorer, checkpoint.config.clone(), comm)?;
        if engine.replicas.locals().count() != checkpoint.replicas.len() {
            return Err(PtError::Checkpoint(format!(
                "snapshot holds {} replicas but this rank owns {}",
                checkpoint.replicas.len(),
                engine.replicas.locals().count()
            )));
        }
        engine.round = checkpoint.round as usize;
        engine.tempering = checkpoint.tempering;
        engine.cumulative = checkpoint.cumulative;
        for (replica, snapshot) in engine
            .replicas
            .locals_mut()
            .iter_mut()
            .zip(checkpoint.replicas)
        {
            replica.chain = snapshot.chain as usize;
            replica.state = snapshot.state;
            replica.rng = snapshot.rng;
            replica.recorder = snapshot.recorder;
        }
        engine.replicas.rebuild_mapping()?;
        Ok(engine)
    }
}
