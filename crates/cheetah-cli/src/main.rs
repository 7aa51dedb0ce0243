//! Cheetah command-line interface.
//!
//! Runs the Cheetah agreement protocol on a deterministic in-process
//! cluster and prints what every replica ended up with.
//!
//! # Quick Start
//!
//! ```bash
//! # One request on a reliable 4-replica cluster
//! cheetah simulate
//!
//! # Lose every COMMIT and watch the fallback move the view
//! cheetah simulate --drop commit --drop-probability 1.0
//!
//! # Show the merged configuration
//! cheetah config show
//! ```

mod commands;
mod style;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Cheetah - Byzantine fault tolerant single-decision agreement.
#[derive(Parser)]
#[command(name = "cheetah")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Run one request through a simulated cluster.
    Simulate(commands::simulate::SimulateArgs),

    /// Run a named scenario.
    Scenario {
        /// Scenario name (see `cheetah scenario --list`).
        #[arg(required_unless_present = "list")]
        name: Option<String>,

        /// Simulation seed.
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// List the available scenarios.
        #[arg(long)]
        list: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the merged configuration.
    Show {
        /// Extra config file merged over the project files.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (toml, json).
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Show where configuration files are looked up.
    Paths,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so reports on stdout stay machine-readable.
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Simulate(args) => commands::simulate::run(&args),
        Commands::Scenario {
            name,
            seed,
            list,
            json,
        } => {
            if list {
                commands::scenario::list();
                Ok(())
            } else {
                commands::scenario::run(name.as_deref().unwrap_or_default(), seed, json)
            }
        }
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { config, format } => {
                commands::config::show(config.as_deref(), &format)
            }
            ConfigCommands::Paths => commands::config::paths(),
        },
    }
}
