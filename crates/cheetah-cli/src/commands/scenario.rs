//! Named scenarios.

use anyhow::{Result, bail};
use cheetah_sim::ScenarioType;

use super::simulate::print_report;
use crate::style::SemanticStyle;

pub fn list() {
    println!("{}", "Scenarios".header());
    for scenario in ScenarioType::ALL {
        println!("  {:<22} {}", scenario.name().code(), scenario.description().muted());
    }
}

pub fn run(name: &str, seed: u64, json: bool) -> Result<()> {
    let Some(scenario) = ScenarioType::from_name(name) else {
        bail!("Unknown scenario '{name}'. Run 'cheetah scenario --list' to see the available ones.");
    };

    let sim = scenario.run(seed)?;
    print_report(&sim.report(), json)
}
