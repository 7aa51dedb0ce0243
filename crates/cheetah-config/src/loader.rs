//! Configuration loader with multi-source merging

use crate::{CheetahConfig, ConfigSource, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    explicit_file: Option<PathBuf>,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "CHEETAH".to_string(),
            explicit_file: None,
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "CHEETAH")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Merge a required file after the project files (e.g. `--config`)
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Skip ~/.config/cheetah/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<CheetahConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = CheetahConfig::default();
        builder = builder.add_source(
            config::Config::try_from(&defaults).context("Failed to encode default configuration")?,
        );

        // 2-4. User, project, then local (gitignored) files
        for (source, path) in Paths::new().lookup_order(&self.project_dir) {
            if source == ConfigSource::User && !self.user_config {
                continue;
            }
            if path.exists() {
                builder = builder.add_source(
                    config::File::from(path)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // 5. Explicit file, must exist
        if let Some(path) = &self.explicit_file {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            builder = builder.add_source(
                config::File::from(path.clone())
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }

        // 6. Environment variables (CHEETAH_CLUSTER__NODES=7)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> CheetahConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrimaryMode;
    use cheetah_bft::{FallbackAdvance, MessageKind};
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("CHEETAH_TEST_UNSET")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config, CheetahConfig::default());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[cluster]
nodes = 7
faults = 2
primary = "round-robin"
fallback_advance = "external"

[simulation]
seed = 99
drop_probability = 0.25
drop_kinds = ["commit", "cp-main-vote"]
timeout_after_steps = 30
"#;
        fs::write(project_dir.join("cheetah.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.cluster.nodes, 7);
        assert_eq!(config.cluster.faults, 2);
        assert_eq!(config.cluster.primary, PrimaryMode::RoundRobin);
        assert_eq!(config.cluster.fallback_advance, FallbackAdvance::External);
        assert_eq!(config.simulation.seed, 99);
        assert_eq!(
            config.simulation.drop_kinds,
            vec![MessageKind::Commit, MessageKind::CpMainVote]
        );
        assert_eq!(config.simulation.timeout_after_steps, Some(30));
        // Untouched keys keep their defaults
        assert_eq!(config.simulation.request_value, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("cheetah.toml"),
            "[simulation]\nseed = 1\nrequest_value = 5\n",
        )
        .expect("Failed to write project config");
        fs::write(
            project_dir.join("cheetah.local.toml"),
            "[simulation]\nseed = 2\n",
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        // Local config should override project config
        assert_eq!(config.simulation.seed, 2);
        assert_eq!(config.simulation.request_value, 5);
    }

    #[test]
    fn test_explicit_file_wins_over_project() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(project_dir.join("cheetah.toml"), "[cluster]\nnodes = 7\n")
            .expect("Failed to write project config");
        let explicit = project_dir.join("scenario.toml");
        fs::write(&explicit, "[cluster]\nnodes = 10\nfaults = 3\n")
            .expect("Failed to write explicit config");

        let config = loader(project_dir)
            .with_file(&explicit)
            .load()
            .expect("Failed to load config");

        assert_eq!(config.cluster.nodes, 10);
        assert_eq!(config.cluster.faults, 3);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let result = loader(temp_dir.path())
            .with_file(temp_dir.path().join("missing.toml"))
            .load();

        assert!(result.is_err());
    }

    // Environment overrides are not exercised here since the process
    // environment is shared between tests. In actual usage:
    //
    // CHEETAH_CLUSTER__NODES=7
    // CHEETAH_SIMULATION__SEED=12
}
