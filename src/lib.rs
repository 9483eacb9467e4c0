use numpy::{IntoPyArray, PyArray1};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use pt_core::comm::Communicator;
use pt_core::config::RunConfig;
use pt_core::explore::RandomWalk;
use pt_core::model::{NormalPair, UnidentifiableProduct};
use pt_core::run::{Engine, RunSummary};

enum EngineKind {
    Normal(Engine<NormalPair, RandomWalk>),
    Product(Engine<UnidentifiableProduct, RandomWalk>),
}

#[pyclass]
struct PtSampler {
    engine: EngineKind,
}

#[pymethods]
impl PtSampler {
    /// Create a parallel tempering sampler.
    ///
    /// Arguments:
    ///   model: "normal" (anneal N(ref_mean, ref_std) into
    ///     N(target_mean, target_std), `dim` iid coordinates) or
    ///     "product" (uniform reference, p1*p2 coin-flip posterior with
    ///     `trials` and `successes`)
    ///   n_chains: chains on the fixed leg
    ///   n_chains_variational: chains on the variational leg (0 = off)
    #[new]
    #[pyo3(signature = (
        model,
        n_chains = 10,
        n_chains_variational = 0,
        seed = 1,
        multithreaded = false,
        ref_mean = -3.0,
        ref_std = 1.0,
        target_mean = 3.0,
        target_std = 1.0,
        dim = 1,
        trials = 100,
        successes = 50,
        step_size = 0.5,
        n_passes = 4,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        model: &str,
        n_chains: usize,
        n_chains_variational: usize,
        seed: u64,
        multithreaded: bool,
        ref_mean: f64,
        ref_std: f64,
        target_mean: f64,
        target_std: f64,
        dim: usize,
        trials: u64,
        successes: u64,
        step_size: f64,
        n_passes: usize,
    ) -> PyResult<Self> {
        if ref_std <= 0.0 || target_std <= 0.0 {
            return Err(PyValueError::new_err("standard deviations must be positive"));
        }
        if step_size <= 0.0 || n_passes == 0 {
            return Err(PyValueError::new_err(
                "step_size must be positive and n_passes >= 1",
            ));
        }
        if successes > trials {
            return Err(PyValueError::new_err("successes cannot exceed trials"));
        }
        let config = RunConfig {
            seed,
            n_chains,
            n_chains_variational,
            multithreaded,
            ..RunConfig::default()
        };
        let explorer = RandomWalk {
            step_size,
            n_passes,
        };
        let engine = match model {
            "normal" => {
                let pair = NormalPair {
                    ref_mean,
                    ref_std,
                    target_mean,
                    target_std,
                    dim,
                };
                EngineKind::Normal(
                    Engine::new(pair, explorer, config, Communicator::Solo)
                        .map_err(|e| PyValueError::new_err(e.to_string()))?,
                )
            }
            "product" => EngineKind::Product(
                Engine::new(
                    UnidentifiableProduct::new(trials, successes),
                    explorer,
                    config,
                    Communicator::Solo,
                )
                .map_err(|e| PyValueError::new_err(e.to_string()))?,
            ),
            _ => {
                return Err(PyValueError::new_err(
                    "unknown model, expected 'normal' or 'product'",
                ))
            }
        };
        Ok(Self { engine })
    }

    /// Run `n_rounds` tempering rounds.
    ///
    /// Returns: dict with keys "schedule", "rejection_rates",
    ///   "permutation" (numpy arrays), "barrier", "barrier_variational",
    ///   "nan_count", "rounds".
    fn run<'py>(&mut self, py: Python<'py>, n_rounds: usize) -> PyResult<Bound<'py, PyDict>> {
        let (summary, permutation) = match &mut self.engine {
            EngineKind::Normal(engine) => run_engine(engine, n_rounds)?,
            EngineKind::Product(engine) => run_engine(engine, n_rounds)?,
        };

        let dict = PyDict::new(py);
        dict.set_item("rounds", summary.rounds)?;
        dict.set_item("schedule", summary.schedule.into_pyarray(py))?;
        dict.set_item("rejection_rates", summary.rejection_rates.into_pyarray(py))?;
        dict.set_item("permutation", permutation.into_pyarray(py))?;
        dict.set_item("barrier", summary.barrier)?;
        dict.set_item("barrier_variational", summary.barrier_variational)?;
        dict.set_item("nan_count", summary.nan_count)?;
        Ok(dict)
    }

    /// Current chain-to-replica permutation as a numpy array.
    fn permutation<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray1<u64>>> {
        let perm = match &self.engine {
            EngineKind::Normal(engine) => engine.gather_permutation(),
            EngineKind::Product(engine) => engine.gather_permutation(),
        }
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok(perm.into_pyarray(py))
    }

    /// Current global communication barrier of the fixed leg.
    fn global_barrier(&self) -> f64 {
        match &self.engine {
            EngineKind::Normal(engine) => engine.global_barrier(),
            EngineKind::Product(engine) => engine.global_barrier(),
        }
    }

    /// Current global communication barrier of the variational leg.
    fn global_barrier_variational(&self) -> f64 {
        match &self.engine {
            EngineKind::Normal(engine) => engine.global_barrier_variational(),
            EngineKind::Product(engine) => engine.global_barrier_variational(),
        }
    }
}

fn run_engine<M, X>(engine: &mut Engine<M, X>, n_rounds: usize) -> PyResult<(RunSummary, Vec<u64>)>
where
    M: pt_core::model::Model + Clone,
    X: pt_core::explore::Explore<M> + Clone,
{
    let summary = engine
        .run_rounds(n_rounds)
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    let permutation = engine
        .gather_permutation()
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    Ok((summary, permutation))
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PtSampler>()?;
    Ok(())
}
