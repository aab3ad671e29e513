// ABOUTME: Configuration types and parsing for ferry.yml.
// ABOUTME: Handles YAML parsing, config discovery, and path resolution.

mod build;
mod defaults;
mod deserialize;
mod env_value;
mod init;
mod known_hosts;
mod target;

pub use build::BuildConfig;
pub use defaults::{BackoffConfig, Defaults};
pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;
pub use known_hosts::KnownHostsPolicy;
pub use target::{Address, TargetConfig};

use crate::error::{Error, Result};
use crate::types::TargetId;
use deserialize::deserialize_targets;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "ferry.yml";
pub const CONFIG_FILENAME_ALT: &str = "ferry.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".ferry/config.yml";

const DEFAULT_STATE_DIR: &str = ".ferry/state";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub build: BuildConfig,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(deserialize_with = "deserialize_targets")]
    pub targets: BTreeMap<TargetId, TargetConfig>,

    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Directory relative paths are resolved against.
    #[serde(skip, default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        if let Some(parent) = path.parent() {
            // "ferry.yml" has an empty parent
            if !parent.as_os_str().is_empty() {
                config.root = parent.to_path_buf();
            }
        }
        if path.ends_with(CONFIG_FILENAME_DIR) {
            // .ferry/config.yml lives one level below the project root
            if let Some(project) = config.root.parent() {
                config.root = project.to_path_buf();
            }
        }
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn target(&self, id: &TargetId) -> Option<&TargetConfig> {
        self.targets.get(id)
    }

    /// Resolve a config-relative path against the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Working directory for build commands.
    pub fn build_dir(&self) -> PathBuf {
        match &self.build.working_dir {
            Some(dir) => self.resolve_path(dir),
            None => self.root.clone(),
        }
    }

    /// Artifact directory, relative paths resolved against the build directory.
    pub fn artifact_dir(&self) -> PathBuf {
        let artifact = &self.build.artifact;
        if artifact.is_absolute() {
            artifact.clone()
        } else {
            self.build_dir().join(artifact)
        }
    }

    /// Directory holding lock files and the attempt log.
    pub fn state_dir(&self) -> PathBuf {
        match &self.state_dir {
            Some(dir) => self.resolve_path(dir),
            None => self.root.join(DEFAULT_STATE_DIR),
        }
    }
}
