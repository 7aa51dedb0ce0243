//! Agreement and determinism under adversarial schedules.

use cheetah_bft::{ClusterConfig, MessageKind, Value};
use cheetah_sim::{NetworkConfig, SimConfig, Simulation};
use proptest::prelude::*;

fn lossy_config(seed: u64, reorder: bool, drop_probability: f64, kinds: Vec<MessageKind>) -> SimConfig {
    SimConfig::new(ClusterConfig::minimal(1).unwrap())
        .with_seed(seed)
        .with_network(
            NetworkConfig::default()
                .with_reorder(reorder)
                .with_drops(drop_probability, kinds),
        )
}

fn run(config: SimConfig) -> Simulation {
    let mut sim = Simulation::new(config);
    sim.submit_request(Value::new(42)).unwrap();
    sim.run(5_000).unwrap();
    sim
}

#[test]
fn same_seed_replays_the_same_run() {
    let config = || lossy_config(99, true, 0.3, vec![MessageKind::Commit]);

    let first = run(config()).report();
    let second = run(config()).report();
    assert_eq!(first, second);
}

fn lossy_kinds() -> impl Strategy<Value = Vec<MessageKind>> {
    prop_oneof![
        Just(vec![MessageKind::Commit]),
        Just(vec![MessageKind::PrePrepare]),
        Just(vec![MessageKind::PrePrepare, MessageKind::Commit]),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// No two replicas decide different values in the same view, whatever
    /// the delivery order and optimistic-path losses.
    #[test]
    fn agreement_holds_under_loss_and_reordering(
        seed in any::<u64>(),
        reorder in any::<bool>(),
        drop_probability in 0.0f64..=1.0,
        kinds in lossy_kinds(),
    ) {
        let sim = run(lossy_config(seed, reorder, drop_probability, kinds));
        prop_assert!(sim.check_agreement().is_ok(), "{}", sim.report());
    }
}
