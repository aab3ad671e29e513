// ABOUTME: Error types for deployment runs.
// ABOUTME: Wraps each component error with its phase and maps failure classes to exit codes.

use super::lock::LockInfo;
use super::state::DeployState;
use crate::build::BuildError;
use crate::resolve::ResolutionError;
use crate::transport::TransportError;
use crate::types::TargetId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Another run holds the target.
#[derive(Debug)]
pub struct ConflictError {
    pub target: TargetId,
    pub waited: Duration,
    /// Holder details, when known.
    pub holder: Option<LockInfo>,
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "target {} is locked by another deployment (waited {:?})",
            self.target, self.waited
        )?;
        if let Some(holder) = &self.holder {
            write!(
                f,
                "; held by {} (pid {}) since {}",
                holder.holder, holder.pid, holder.started_at
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ConflictError {}

/// Errors that end a deployment run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("{source} (after {attempts} attempt(s))")]
    Transport {
        source: TransportError,
        attempts: u32,
    },

    #[error("restart command exited with code {exit_code}: {output}")]
    Restart { exit_code: u32, output: String },

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("failed to lock target {target}: {reason}")]
    Lock { target: TargetId, reason: String },

    #[error("run cancelled while {state}")]
    Cancelled { state: DeployState },
}

/// Failure class of a [`DeployError`], stable across releases for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployErrorKind {
    Build,
    Resolution,
    Transport,
    Restart,
    Conflict,
    Lock,
    Cancelled,
}

impl DeployErrorKind {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployErrorKind::Build => 10,
            DeployErrorKind::Resolution => 11,
            DeployErrorKind::Transport => 12,
            DeployErrorKind::Restart => 13,
            DeployErrorKind::Conflict => 14,
            DeployErrorKind::Cancelled => 15,
            DeployErrorKind::Lock => 16,
        }
    }
}

impl fmt::Display for DeployErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployErrorKind::Build => "build",
            DeployErrorKind::Resolution => "resolution",
            DeployErrorKind::Transport => "transport",
            DeployErrorKind::Restart => "restart",
            DeployErrorKind::Conflict => "conflict",
            DeployErrorKind::Lock => "lock",
            DeployErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Build(_) => DeployErrorKind::Build,
            DeployError::Resolution(_) => DeployErrorKind::Resolution,
            DeployError::Transport { .. } => DeployErrorKind::Transport,
            DeployError::Restart { .. } => DeployErrorKind::Restart,
            DeployError::Conflict(_) => DeployErrorKind::Conflict,
            DeployError::Lock { .. } => DeployErrorKind::Lock,
            DeployError::Cancelled { .. } => DeployErrorKind::Cancelled,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    /// Lock holder details, if this is a conflict with a known holder.
    pub fn lock_holder_info(&self) -> Option<&LockInfo> {
        match self {
            DeployError::Conflict(conflict) => conflict.holder.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn transport(source: TransportError, attempts: u32) -> Self {
        DeployError::Transport { source, attempts }
    }
}
