//! The simulation driver.
//!
//! A [`Simulation`] owns one [`Node`] per replica, each with a `Vec`
//! outbox as its transport. After every node step the outbox is drained
//! into the [`SimNetwork`], which then decides what gets delivered, when,
//! and whether at all.
//!
//! Timeouts are modeled as a single cluster-wide event. They fire once,
//! either after a configured number of deliveries or as soon as the network
//! goes quiet with an undecided replica left.

use std::collections::BTreeMap;
use std::fmt;

use cheetah_bft::{
    ClusterConfig, Message, Node, NodeStep, ReplicaId, ReplicaOptions, Value, ViewNumber,
};
use serde::Serialize;

use crate::SimRng;
use crate::error::SimError;
use crate::network::{NetworkConfig, NetworkStats, SimNetwork};

/// Sender id used for client requests.
pub const CLIENT_ID: ReplicaId = ReplicaId::new(u8::MAX);

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub cluster: ClusterConfig,
    pub options: ReplicaOptions,
    pub seed: u64,
    /// Step budget used by [`Simulation::run_until_quiescent`] callers that
    /// do not pass their own.
    pub max_steps: u64,
    pub network: NetworkConfig,
    /// Fire timeouts after this many deliveries instead of waiting for the
    /// network to go quiet.
    pub timeout_after_steps: Option<u64>,
}

impl SimConfig {
    pub fn new(cluster: ClusterConfig) -> Self {
        Self {
            cluster,
            options: ReplicaOptions::default(),
            seed: 0,
            max_steps: 10_000,
            network: NetworkConfig::default(),
            timeout_after_steps: None,
        }
    }

    pub fn with_options(mut self, options: ReplicaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_timeout_after(mut self, steps: Option<u64>) -> Self {
        self.timeout_after_steps = steps;
        self
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// Deterministic multi-replica simulation.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    rng: SimRng,
    nodes: Vec<Node<Vec<Message>>>,
    network: SimNetwork,
    steps: u64,
    timeouts_fired: bool,
    decisions: u64,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let mut master = SimRng::new(config.seed);
        let rng = master.fork();

        let nodes = config
            .cluster
            .replicas()
            .map(|id| Node::new(id, config.cluster.clone(), config.options, Vec::new()))
            .collect();
        let network = SimNetwork::new(config.network.clone(), config.cluster.cluster_size());

        tracing::debug!(
            seed = config.seed,
            replicas = config.cluster.cluster_size(),
            faults = config.cluster.max_faults(),
            reorder = config.network.reorder,
            drop_probability = config.network.drop_probability,
            "simulation created"
        );

        Self {
            config,
            rng,
            nodes,
            network,
            steps: 0,
            timeouts_fired: false,
            decisions: 0,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Number of messages delivered so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.network.stats()
    }

    /// Returns the replica with `id`.
    pub fn replica(&self, id: ReplicaId) -> Result<&cheetah_bft::Replica, SimError> {
        self.nodes
            .get(id.as_usize())
            .map(Node::replica)
            .ok_or(SimError::UnknownReplica(id))
    }

    pub fn replicas(&self) -> impl Iterator<Item = &cheetah_bft::Replica> {
        self.nodes.iter().map(Node::replica)
    }

    pub fn all_decided(&self) -> bool {
        self.replicas().all(cheetah_bft::Replica::is_decided)
    }

    /// True once nothing is in flight and no timer or round is pending.
    pub fn is_quiescent(&self) -> bool {
        self.network.is_idle() && !self.has_pending_round() && !self.timeout_due_on_idle()
    }

    // ------------------------------------------------------------------------
    // External inputs
    // ------------------------------------------------------------------------

    /// Hands a client request to every replica, in id order.
    pub fn submit_request(&mut self, value: Value) -> Result<(), SimError> {
        tracing::info!(value = %value, "submitting client request");
        let request = Message::request(CLIENT_ID, ViewNumber::ZERO, value);
        for index in 0..self.nodes.len() {
            let step = self.nodes[index].deliver(request.clone());
            self.after_step(index, step)?;
        }
        Ok(())
    }

    /// Fires the timeout at every replica, in id order.
    pub fn fire_timeouts(&mut self) -> Result<(), SimError> {
        self.timeouts_fired = true;
        tracing::debug!(step = self.steps, "firing timeouts");
        for index in 0..self.nodes.len() {
            let step = self.nodes[index].timeout();
            self.after_step(index, step)?;
        }
        Ok(())
    }

    /// Fires the timeout at a single replica.
    pub fn fire_timeout(&mut self, id: ReplicaId) -> Result<(), SimError> {
        let index = self.index_of(id)?;
        let step = self.nodes[index].timeout();
        self.after_step(index, step)
    }

    /// Starts every fallback round left pending in external-advance mode.
    pub fn advance_pending_rounds(&mut self) -> Result<usize, SimError> {
        let mut advanced = 0;
        for index in 0..self.nodes.len() {
            if self.nodes[index].replica().is_awaiting_round_start() {
                let step = self.nodes[index].advance_round();
                self.after_step(index, step)?;
                advanced += 1;
            }
        }
        Ok(advanced)
    }

    // ------------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------------

    /// Performs one unit of progress.
    ///
    /// Delivers the next envelope if there is one. On an idle network,
    /// pending fallback rounds are started first, then the timeout fires.
    /// Returns false when there is nothing left to do.
    pub fn step(&mut self) -> Result<bool, SimError> {
        if let Some(delivery) = self.network.deliver_next(&mut self.rng)? {
            let index = self.index_of(delivery.to)?;
            let step = self.nodes[index].deliver(delivery.message);
            self.steps += 1;
            self.after_step(index, step)?;

            if let Some(after) = self.config.timeout_after_steps {
                if !self.timeouts_fired && self.steps >= after {
                    self.fire_timeouts()?;
                }
            }
            return Ok(true);
        }

        if self.has_pending_round() {
            self.advance_pending_rounds()?;
            return Ok(true);
        }

        if self.timeout_due_on_idle() {
            self.fire_timeouts()?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Steps until quiet or until `max_steps` deliveries. Returns the number
    /// of deliveries made by this call.
    pub fn run(&mut self, max_steps: u64) -> Result<u64, SimError> {
        let start = self.steps;
        while self.steps - start < max_steps {
            if !self.step()? {
                break;
            }
        }
        Ok(self.steps - start)
    }

    /// Like [`Simulation::run`], but a run that does not go quiet within
    /// the budget is an error.
    pub fn run_until_quiescent(&mut self, max_steps: u64) -> Result<u64, SimError> {
        let delivered = self.run(max_steps)?;
        if !self.is_quiescent() {
            tracing::warn!(
                max_steps,
                in_flight = self.network.in_flight(),
                "step limit reached before quiescence"
            );
            return Err(SimError::StepLimitExceeded { max_steps });
        }
        tracing::info!(steps = self.steps, decisions = self.decisions, "simulation quiesced");
        Ok(delivered)
    }

    // ------------------------------------------------------------------------
    // Checks and reporting
    // ------------------------------------------------------------------------

    /// Verifies that no two replicas decided different values in the same
    /// view.
    pub fn check_agreement(&self) -> Result<(), SimError> {
        let mut by_view: BTreeMap<ViewNumber, (ReplicaId, Option<Value>)> = BTreeMap::new();

        for replica in self.replicas().filter(|r| r.is_decided()) {
            let id = replica.replica_id();
            let value = replica.decided_value();
            match by_view.get(&replica.view()) {
                Some(&(first, first_value)) if first_value != value => {
                    return Err(SimError::AgreementViolation {
                        view: replica.view(),
                        first,
                        first_value,
                        second: id,
                        second_value: value,
                    });
                }
                Some(_) => {}
                None => {
                    by_view.insert(replica.view(), (id, value));
                }
            }
        }
        Ok(())
    }

    /// Summarizes the run.
    pub fn report(&self) -> SimReport {
        SimReport {
            seed: self.config.seed,
            steps: self.steps,
            timeouts_fired: self.timeouts_fired,
            agreement: self.check_agreement().is_ok(),
            network: self.network.stats(),
            replicas: self
                .replicas()
                .map(|r| ReplicaReport {
                    id: r.replica_id().as_u8(),
                    phase: r.phase().to_string(),
                    view: r.view().as_u64(),
                    cp_round: r.cp_round().as_u64(),
                    decided: r.is_decided(),
                    decided_value: r.decided_value().map(Value::as_u64),
                    committed: r.committed_count(),
                })
                .collect(),
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn index_of(&self, id: ReplicaId) -> Result<usize, SimError> {
        let index = id.as_usize();
        if index < self.nodes.len() {
            Ok(index)
        } else {
            Err(SimError::UnknownReplica(id))
        }
    }

    fn has_pending_round(&self) -> bool {
        self.replicas().any(cheetah_bft::Replica::is_awaiting_round_start)
    }

    fn timeout_due_on_idle(&self) -> bool {
        !self.timeouts_fired && !self.all_decided()
    }

    /// Moves a node's outbox onto the network.
    fn after_step(&mut self, index: usize, step: NodeStep) -> Result<(), SimError> {
        if let Some(decision) = step.decided {
            self.decisions += 1;
            tracing::debug!(
                replica = index,
                view = %decision.view,
                value = ?decision.value,
                "replica decided"
            );
        }

        let outbox = std::mem::take(self.nodes[index].transport_mut());
        for message in &outbox {
            self.network.broadcast(message, &mut self.rng)?;
        }
        Ok(())
    }
}

// ============================================================================
// Report
// ============================================================================

/// Final state of one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaReport {
    pub id: u8,
    pub phase: String,
    pub view: u64,
    pub cp_round: u64,
    pub decided: bool,
    pub decided_value: Option<u64>,
    pub committed: usize,
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimReport {
    pub seed: u64,
    pub steps: u64,
    pub timeouts_fired: bool,
    pub agreement: bool,
    pub network: NetworkStats,
    pub replicas: Vec<ReplicaReport>,
}

impl SimReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "seed:      {}", self.seed)?;
        writeln!(f, "steps:     {}", self.steps)?;
        writeln!(f, "timeouts:  {}", if self.timeouts_fired { "fired" } else { "not fired" })?;
        writeln!(
            f,
            "network:   {} sent, {} delivered, {} dropped",
            self.network.sent, self.network.delivered, self.network.dropped
        )?;
        writeln!(f, "agreement: {}", if self.agreement { "ok" } else { "VIOLATED" })?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<8} {:<14} {:>5} {:>6} {:>10} {:>9}",
            "replica", "phase", "view", "round", "committed", "decided"
        )?;
        for r in &self.replicas {
            let decided = match (r.decided, r.decided_value) {
                (false, _) => "-".to_owned(),
                (true, Some(v)) => v.to_string(),
                (true, None) => "null".to_owned(),
            };
            writeln!(
                f,
                "{:<8} {:<14} {:>5} {:>6} {:>10} {:>9}",
                r.id, r.phase, r.view, r.cp_round, r.committed, decided
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheetah_bft::{MessageKind, Phase};

    fn sim(network: NetworkConfig) -> Simulation {
        let cluster = ClusterConfig::minimal(1).unwrap();
        Simulation::new(SimConfig::new(cluster).with_network(network))
    }

    #[test]
    fn idle_simulation_fires_timeouts_once() {
        let mut sim = sim(NetworkConfig::default());
        assert!(!sim.is_quiescent());

        sim.run_until_quiescent(1_000).unwrap();
        assert!(sim.report().timeouts_fired);
        // Nobody received a request: round 0 votes Yes, the view moves on and
        // Commit(null) in view 1 reaches the fast path everywhere.
        for replica in sim.replicas() {
            assert_eq!(replica.view(), ViewNumber::new(1));
            assert_eq!(replica.phase(), Phase::Decided);
            assert_eq!(replica.decided_value(), None);
        }
        sim.check_agreement().unwrap();
    }

    #[test]
    fn happy_path_never_times_out() {
        let mut sim = sim(NetworkConfig::default());
        sim.submit_request(Value::new(7)).unwrap();
        sim.run_until_quiescent(1_000).unwrap();

        assert!(sim.all_decided());
        assert!(!sim.report().timeouts_fired);
        sim.check_agreement().unwrap();
    }

    #[test]
    fn timeout_after_steps_interrupts_the_optimistic_path() {
        let cluster = ClusterConfig::minimal(1).unwrap();
        let mut sim = Simulation::new(SimConfig::new(cluster).with_timeout_after(Some(1)));
        sim.submit_request(Value::new(7)).unwrap();

        assert!(sim.step().unwrap());
        assert!(sim.report().timeouts_fired);
        assert!(sim.replicas().all(|r| r.phase().is_fallback()));

        sim.run_until_quiescent(1_000).unwrap();
        sim.check_agreement().unwrap();
    }

    #[test]
    fn step_limit_is_reported() {
        let mut sim = sim(NetworkConfig::default());
        sim.submit_request(Value::new(7)).unwrap();
        let err = sim.run_until_quiescent(2).unwrap_err();
        assert!(matches!(err, SimError::StepLimitExceeded { max_steps: 2 }));
    }

    #[test]
    fn unknown_replica_is_rejected() {
        let mut sim = sim(NetworkConfig::default());
        assert!(matches!(
            sim.fire_timeout(ReplicaId::new(9)),
            Err(SimError::UnknownReplica(_))
        ));
        assert!(sim.replica(ReplicaId::new(4)).is_err());
    }

    #[test]
    fn report_renders_every_replica() {
        let mut sim = sim(NetworkConfig::default().with_drops(1.0, [MessageKind::Reply]));
        sim.submit_request(Value::new(7)).unwrap();
        sim.run_until_quiescent(1_000).unwrap();

        let report = sim.report();
        assert_eq!(report.replicas.len(), 4);
        assert!(report.agreement);

        let text = report.to_string();
        assert!(text.contains("agreement: ok"));
        let json = report.to_json().unwrap();
        assert!(json.contains("\"decided_value\": 7"));
    }
}
