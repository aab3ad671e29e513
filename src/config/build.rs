// ABOUTME: Build section of the config: commands, artifact directory, environment.
// ABOUTME: Commands run in order; the artifact directory is verified afterwards.

use super::EnvValue;
use super::deserialize::deserialize_commands;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    #[serde(deserialize_with = "deserialize_commands")]
    pub commands: NonEmpty<String>,

    pub artifact: PathBuf,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,
}
