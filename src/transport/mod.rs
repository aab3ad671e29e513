// ABOUTME: Transport client: copies an artifact to a target and runs remote commands.
// ABOUTME: The orchestrator talks to the Transport trait; SshTransport is the real implementation.

mod archive;
mod error;
mod ssh;

pub use archive::pack;
pub use error::{Phase, TransportCause, TransportError};
pub use ssh::SshTransport;

use crate::build::BuildArtifact;
use crate::resolve::DeploymentTarget;
use async_trait::async_trait;
use std::time::Duration;

/// Summary of a completed copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub files: usize,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Outcome of a remote command. A non-zero exit is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub ok: bool,
    pub exit_code: u32,
    pub output: String,
}

impl CommandResult {
    pub fn new(exit_code: u32, output: impl Into<String>) -> Self {
        Self {
            ok: exit_code == 0,
            exit_code,
            output: output.into(),
        }
    }
}

/// Reaches a single target. Implementations never retry internally and
/// release any session they open before returning.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Copy the artifact tree recursively to the target's remote path.
    async fn transfer(
        &self,
        target: &DeploymentTarget,
        artifact: &BuildArtifact,
    ) -> Result<TransferResult, TransportError>;

    /// Run one command on the target and report its exit code and output.
    async fn exec_remote(
        &self,
        target: &DeploymentTarget,
        command: &str,
    ) -> Result<CommandResult, TransportError>;
}
