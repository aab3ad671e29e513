// ABOUTME: Deployment states: the observable state enum and the typed pipeline markers.
// ABOUTME: Markers carry the data each stage produced, so later stages cannot run early.

use crate::build::BuildArtifact;
use crate::resolve::DeploymentTarget;
use crate::transport::{CommandResult, TransferResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible state of a run, as reported to event sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployState {
    Idle,
    Building,
    Resolving,
    Transferring,
    Restarting,
    Succeeded,
    Failed,
}

impl DeployState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployState::Succeeded | DeployState::Failed)
    }
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployState::Idle => "idle",
            DeployState::Building => "building",
            DeployState::Resolving => "resolving",
            DeployState::Transferring => "transferring",
            DeployState::Restarting => "restarting",
            DeployState::Succeeded => "succeeded",
            DeployState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Initial state: nothing built yet.
/// Available actions: `build()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Built: artifact verified on disk.
/// Available actions: `resolve()`
#[derive(Debug, Clone)]
pub struct Built {
    pub(crate) artifact: BuildArtifact,
}

/// Resolved: target and credential known.
/// Available actions: `transfer()`, `into_parts()`
#[derive(Debug)]
pub struct Resolved {
    pub(crate) artifact: BuildArtifact,
    pub(crate) target: DeploymentTarget,
}

/// Transferred: artifact copied to the remote path.
/// Available actions: `restart()`
#[derive(Debug)]
pub struct Transferred {
    pub(crate) artifact: BuildArtifact,
    pub(crate) target: DeploymentTarget,
    pub(crate) transfer: TransferResult,
}

/// Restarted: remote restart command exited 0. Terminal.
#[derive(Debug)]
pub struct Restarted {
    pub(crate) artifact: BuildArtifact,
    pub(crate) transfer: TransferResult,
    pub(crate) restart: CommandResult,
}
