//! Where configuration files live and the order they are merged in.

use crate::ConfigError;
use directories::ProjectDirs;
use std::fmt;
use std::path::{Path, PathBuf};

const PROJECT_FILE: &str = "cheetah.toml";
const LOCAL_FILE: &str = "cheetah.local.toml";
const USER_FILE: &str = "config.toml";

/// A file-backed configuration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    /// `~/.config/cheetah/config.toml`
    User,
    /// `cheetah.toml`, checked in.
    Project,
    /// `cheetah.local.toml`, gitignored.
    Local,
}

impl ConfigSource {
    pub fn label(self) -> &'static str {
        match self {
            ConfigSource::User => "user",
            ConfigSource::Project => "project",
            ConfigSource::Local => "local",
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// XDG-aware lookup of Cheetah's configuration files.
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("org", "Cheetah", "cheetah"),
        }
    }

    /// The per-user config directory, if the platform has a home.
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::XdgError("Failed to determine user config directory".to_string())
            })
    }

    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join(USER_FILE))
    }

    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(PROJECT_FILE)
    }

    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(LOCAL_FILE)
    }

    /// File layers for `project_dir`, lowest precedence first.
    ///
    /// The user layer is left out when there is no home directory. Files
    /// are listed whether or not they exist.
    pub fn lookup_order(&self, project_dir: impl AsRef<Path>) -> Vec<(ConfigSource, PathBuf)> {
        let project_dir = project_dir.as_ref();
        let mut order = Vec::with_capacity(3);
        if let Ok(user) = self.user_config_file() {
            order.push((ConfigSource::User, user));
        }
        order.push((ConfigSource::Project, Self::project_config_file(project_dir)));
        order.push((ConfigSource::Local, Self::local_config_file(project_dir)));
        order
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
