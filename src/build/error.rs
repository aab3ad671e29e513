// ABOUTME: Build error types.
// ABOUTME: Each variant names the stage that failed so the attempt record can report it.

use thiserror::Error;

/// Stage name used for post-build artifact verification.
pub const VERIFY_STAGE: &str = "verify";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build command `{stage}` {}", describe_exit(.exit_code))]
    CommandFailed {
        stage: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("failed to start build command `{stage}`: {reason}")]
    Spawn { stage: String, reason: String },

    #[error("missing build environment variable: {0}")]
    MissingEnvVar(String),

    #[error("build environment error: {0}")]
    Environment(String),

    #[error("artifact verification failed: {reason}")]
    Verify { reason: String },
}

impl BuildError {
    /// The command (or "verify") that failed.
    pub fn stage(&self) -> &str {
        match self {
            BuildError::CommandFailed { stage, .. } | BuildError::Spawn { stage, .. } => stage,
            BuildError::MissingEnvVar(_) | BuildError::Environment(_) => "environment",
            BuildError::Verify { .. } => VERIFY_STAGE,
        }
    }

    /// Captured stdout/stderr of the failing command, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            BuildError::CommandFailed { output, .. } => Some(output),
            _ => None,
        }
    }

    pub(crate) fn empty_artifact() -> Self {
        BuildError::Verify {
            reason: "empty artifact".to_string(),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}
