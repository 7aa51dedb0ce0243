//! # cheetah-sim: Deterministic simulation for Cheetah
//!
//! Runs a whole cluster of [`cheetah_bft::Replica`]s in one process over a
//! simulated network. Every source of nondeterminism (delivery order,
//! message loss) is drawn from a seeded [`SimRng`], so a seed replays the
//! same run bit for bit.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Simulation                        │
//! │  Node 0 ─┐                                           │
//! │  Node 1 ─┼─ outbox ──► SimNetwork ──► deliver_next ──┼─► Node k
//! │  Node 2 ─┤            (FIFO or reorder, drops)       │
//! │  Node 3 ─┘                                           │
//! │                                                       │
//! │  timeouts: after N deliveries, or when the network    │
//! │  goes quiet with an undecided replica                 │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use cheetah_bft::{ClusterConfig, Value};
//! use cheetah_sim::{SimConfig, Simulation};
//!
//! let config = SimConfig::new(ClusterConfig::minimal(1).unwrap()).with_seed(12345);
//! let mut sim = Simulation::new(config);
//!
//! sim.submit_request(Value::new(42)).unwrap();
//! sim.run_until_quiescent(1_000).unwrap();
//!
//! assert!(sim.all_decided());
//! sim.check_agreement().unwrap();
//! ```

mod error;
mod network;
mod rng;
mod scenarios;
mod simulation;

pub use error::SimError;
pub use network::{Delivery, NetworkConfig, NetworkStats, SimNetwork};
pub use rng::SimRng;
pub use scenarios::{ScenarioType, fallback_convergence, happy_path};
pub use simulation::{CLIENT_ID, ReplicaReport, SimConfig, SimReport, Simulation};
