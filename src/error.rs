// ABOUTME: Application-wide error types for ferry.
// ABOUTME: Wraps config and deployment failures and maps them to process exit codes.

use crate::deploy::DeployError;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for usage and configuration errors.
pub const EXIT_USAGE: i32 = 1;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Deploy(#[from] DeployError),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Deploy(e) => e.exit_code(),
            _ => EXIT_USAGE,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
