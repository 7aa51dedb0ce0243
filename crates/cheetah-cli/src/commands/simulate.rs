//! The `simulate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cheetah_bft::{FallbackAdvance, MessageKind, Value};
use cheetah_config::{CheetahConfig, ConfigLoader};
use cheetah_sim::{NetworkConfig, SimConfig, SimReport, Simulation};
use clap::Args;

use crate::style::{self, SemanticStyle};

/// Overrides applied on top of the loaded configuration.
#[derive(Debug, Default, Args)]
pub struct SimulateArgs {
    /// Extra config file merged over the project files.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Simulation seed.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Number of replicas (N).
    #[arg(short, long)]
    pub nodes: Option<usize>,

    /// Byzantine faults tolerated (f).
    #[arg(short, long)]
    pub faults: Option<usize>,

    /// Value carried by the client request.
    #[arg(long)]
    pub value: Option<u64>,

    /// Fire timeouts after this many deliveries.
    #[arg(long)]
    pub timeout_after: Option<u64>,

    /// Deliver messages in random order.
    #[arg(long)]
    pub reorder: bool,

    /// Probability that a message is lost.
    #[arg(long)]
    pub drop_probability: Option<f64>,

    /// Message kinds subject to loss (commit, cp-pre-vote, ...). Repeatable.
    #[arg(long = "drop", value_parser = parse_kind)]
    pub drop_kinds: Vec<MessageKind>,

    /// Wait for an explicit start before each fallback round after the first.
    #[arg(long)]
    pub external_advance: bool,

    /// Log every replica phase transition.
    #[arg(long)]
    pub log_transitions: bool,

    /// Upper bound on delivered messages.
    #[arg(long)]
    pub max_steps: Option<u64>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SimulateArgs {
    /// Folds the command-line overrides into `config`.
    pub fn apply(&self, config: &mut CheetahConfig) {
        if let Some(seed) = self.seed {
            config.simulation.seed = seed;
        }
        if let Some(nodes) = self.nodes {
            config.cluster.nodes = nodes;
        }
        if let Some(faults) = self.faults {
            config.cluster.faults = faults;
        }
        if let Some(value) = self.value {
            config.simulation.request_value = value;
        }
        if self.timeout_after.is_some() {
            config.simulation.timeout_after_steps = self.timeout_after;
        }
        if self.reorder {
            config.simulation.reorder = true;
        }
        if let Some(p) = self.drop_probability {
            config.simulation.drop_probability = p;
        }
        if !self.drop_kinds.is_empty() {
            config.simulation.drop_kinds.clone_from(&self.drop_kinds);
        }
        if self.external_advance {
            config.cluster.fallback_advance = FallbackAdvance::External;
        }
        if self.log_transitions {
            config.cluster.log_transitions = true;
        }
        if let Some(max_steps) = self.max_steps {
            config.simulation.max_steps = max_steps;
        }
    }
}

fn parse_kind(s: &str) -> Result<MessageKind, String> {
    serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
        .map_err(|_| format!("unknown message kind '{s}'"))
}

/// Builds the simulator configuration from a validated config.
pub fn sim_config(config: &CheetahConfig) -> Result<SimConfig> {
    config.validate().context("Invalid configuration")?;

    let network = NetworkConfig {
        reorder: config.simulation.reorder,
        drop_probability: config.simulation.drop_probability,
        drop_kinds: config.simulation.drop_kinds.clone(),
    };

    Ok(SimConfig::new(config.cluster_config()?)
        .with_options(config.replica_options())
        .with_seed(config.simulation.seed)
        .with_max_steps(config.simulation.max_steps)
        .with_network(network)
        .with_timeout_after(config.simulation.timeout_after_steps))
}

pub fn run(args: &SimulateArgs) -> Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load().context("Failed to load configuration")?;
    args.apply(&mut config);

    let sim_config = sim_config(&config)?;
    let max_steps = sim_config.max_steps;

    let mut sim = Simulation::new(sim_config);
    sim.submit_request(Value::new(config.simulation.request_value))?;
    let outcome = sim.run_until_quiescent(max_steps);

    print_report(&sim.report(), args.json)?;

    outcome?;
    sim.check_agreement()?;
    Ok(())
}

/// Prints a report as text or JSON.
pub fn print_report(report: &SimReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    print!("{report}");
    println!();

    let decided = report.replicas.iter().filter(|r| r.decided).count();
    if !report.agreement {
        style::print_error("replicas decided different values in the same view");
    } else if decided == report.replicas.len() {
        style::print_success(&format!("all {decided} replicas decided"));
    } else {
        println!(
            "{} {} of {} replicas decided",
            "●".warning(),
            decided,
            report.replicas.len()
        );
    }
    style::print_labeled("reproduce", &format!("cheetah simulate --seed {}", report.seed).code());
    Ok(())
}
