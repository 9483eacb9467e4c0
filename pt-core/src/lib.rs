//! Distributed non-reversible parallel tempering.
//!
//! An ensemble of chains anneals a reference distribution into a target
//! along a schedule of parameters in `[0, 1]`; neighboring chains
//! periodically swap their annealing parameters under the deterministic
//! even-odd (DEO) scheme. Replica states never move between processes;
//! a swap exchanges two doubles and flips two integers, so a round costs
//! one permutation collective regardless of state size.
//!
//! # Pieces
//!
//! | Piece | Module |
//! |-------|--------|
//! | Process group + all-to-all | [`comm`] |
//! | Entangled replica store | [`replica`] |
//! | DEO swap graphs, pair protocol, round driver | [`swap`] |
//! | Schedules, barriers, two-leg container | [`tempering`] |
//! | Bundled models and explorers | [`model`], [`explore`] |
//! | Round loop | [`run`] |
//!
//! Runs are reproducible by construction: every replica RNG is seeded
//! from `(seed, chain at creation)`, so any process count produces the
//! same chains, schedules and statistics bit for bit.
//!
//! # Quick start
//!
//! ```
//! use pt_core::comm::Communicator;
//! use pt_core::config::RunConfig;
//! use pt_core::explore::IidNormal;
//! use pt_core::model::NormalPair;
//! use pt_core::run::Engine;
//!
//! let config = RunConfig {
//!     n_chains: 8,
//!     n_rounds: 64,
//!     ..RunConfig::default()
//! };
//! let mut engine = Engine::new(
//!     NormalPair::well_separated(),
//!     IidNormal,
//!     config,
//!     Communicator::Solo,
//! )
//! .unwrap();
//! let summary = engine.run().unwrap();
//! assert!(summary.barrier > 0.0);
//! ```

pub mod checkpoint;
pub mod comm;
pub mod config;
pub mod error;
pub mod explore;
pub mod model;
pub mod recorder;
pub mod replica;
pub mod run;
pub mod swap;
pub mod tempering;

pub use config::RunConfig;
pub use error::PtError;
pub use run::{Engine, RunSummary};
pub use swap::{swap, PairSwapper, SwapGraph, SwapStat, TestSwapper};
pub use tempering::Tempering;
