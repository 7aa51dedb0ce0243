//! Configuration management commands.

use std::path::Path;

use anyhow::{Context, Result, bail};
use cheetah_config::{ConfigLoader, Paths};

use crate::style::{self, SemanticStyle};

/// Show the merged configuration.
pub fn show(explicit: Option<&Path>, format: &str) -> Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = explicit {
        loader = loader.with_file(path);
    }
    let config = loader.load().context("Failed to load configuration")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        "toml" => print!("{}", config.to_toml()?),
        other => bail!("Unsupported format '{other}' (expected toml or json)"),
    }
    Ok(())
}

/// Show where configuration is looked up, in precedence order.
pub fn paths() -> Result<()> {
    let project = std::env::current_dir().context("Failed to read current directory")?;

    println!("{}", "Configuration sources (lowest precedence first)".header());
    let paths = Paths::new();
    if let Err(e) = paths.user_config_file() {
        style::print_labeled("user", &format!("unavailable ({e})"));
    }
    for (source, path) in paths.lookup_order(&project) {
        style::print_labeled(source.label(), &path.display().to_string());
    }
    style::print_labeled("env", &"CHEETAH_<SECTION>__<KEY>".code());
    Ok(())
}
