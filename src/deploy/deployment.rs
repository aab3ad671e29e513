// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: State types carry their own data for compile-time guarantees.

use crate::build::BuildArtifact;
use crate::resolve::DeploymentTarget;
use crate::transport::{CommandResult, TransferResult};
use crate::types::TargetId;

use super::state::{Built, Initialized, Resolved, Restarted, Transferred};

/// A deployment in progress, parameterized by its current state.
///
/// Each transition consumes the deployment and returns the next state,
/// so a restart cannot be issued before a copy, and a copy cannot start
/// before the target is resolved.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) target_id: TargetId,
    pub(crate) state: S,
}

impl Deployment<Initialized> {
    pub fn new(target_id: TargetId) -> Self {
        Deployment {
            target_id,
            state: Initialized,
        }
    }
}

impl<S> Deployment<S> {
    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }
}

impl Deployment<Built> {
    pub fn artifact(&self) -> &BuildArtifact {
        &self.state.artifact
    }
}

impl Deployment<Resolved> {
    pub fn artifact(&self) -> &BuildArtifact {
        &self.state.artifact
    }

    pub fn target(&self) -> &DeploymentTarget {
        &self.state.target
    }

    /// Stop here (dry run), releasing the target and its credential.
    pub fn into_artifact(self) -> BuildArtifact {
        self.state.artifact
    }
}

impl Deployment<Transferred> {
    pub fn artifact(&self) -> &BuildArtifact {
        &self.state.artifact
    }

    pub fn target(&self) -> &DeploymentTarget {
        &self.state.target
    }

    pub fn transfer(&self) -> &TransferResult {
        &self.state.transfer
    }
}

impl Deployment<Restarted> {
    pub fn artifact(&self) -> &BuildArtifact {
        &self.state.artifact
    }

    pub fn transfer(&self) -> &TransferResult {
        &self.state.transfer
    }

    pub fn restart(&self) -> &CommandResult {
        &self.state.restart
    }
}
