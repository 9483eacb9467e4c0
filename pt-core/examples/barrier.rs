use std::time::Instant;

use pt_core::comm::Communicator;
use pt_core::config::RunConfig;
use pt_core::explore::{IidNormal, RandomWalk};
use pt_core::model::{NormalPair, UnidentifiableProduct};
use pt_core::run::Engine;

const N_CHAINS: usize = 8;
const N_ROUNDS: usize = 2048;

fn main() {
    println!(
        "Chains: {}  |  Rounds: {}  |  seed 1",
        N_CHAINS, N_ROUNDS
    );
    println!("{}", "-".repeat(70));

    // N(-3,1) -> N(3,1): known global barrier about 3.15.
    let config = RunConfig {
        n_chains: N_CHAINS,
        n_rounds: N_ROUNDS,
        ..RunConfig::default()
    };
    let mut engine = Engine::new(
        NormalPair::well_separated(),
        IidNormal,
        config,
        Communicator::Solo,
    )
    .unwrap();
    let t0 = Instant::now();
    let summary = engine.run().unwrap();
    println!(
        "normal pair     barrier {:.3}  (expect ~3.15)  [{:.2} s]",
        summary.barrier,
        t0.elapsed().as_secs_f64()
    );
    println!("  schedule: {:?}", summary.schedule);
    println!("  rejection per interface: {:?}", summary.rejection_rates);

    // Unidentifiable p1*p2 coin-flip posterior: barrier about 1.39.
    let config = RunConfig {
        n_chains: 4,
        n_rounds: N_ROUNDS,
        ..RunConfig::default()
    };
    let mut engine = Engine::new(
        UnidentifiableProduct::new(100, 50),
        RandomWalk {
            step_size: 0.15,
            n_passes: 8,
        },
        config,
        Communicator::Solo,
    )
    .unwrap();
    let t0 = Instant::now();
    let summary = engine.run().unwrap();
    println!(
        "product model   barrier {:.3}  (expect ~1.39)  [{:.2} s]",
        summary.barrier,
        t0.elapsed().as_secs_f64()
    );
}
