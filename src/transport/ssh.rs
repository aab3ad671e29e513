// ABOUTME: Transport implementation over SSH.
// ABOUTME: Opens one session per operation and always disconnects it before returning.

use super::archive::pack;
use super::error::{Phase, TransportCause, TransportError};
use super::{CommandResult, TransferResult, Transport};
use crate::build::BuildArtifact;
use crate::resolve::DeploymentTarget;
use crate::ssh::{Session, SessionConfig};
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Transport backed by russh sessions.
#[derive(Debug, Clone)]
pub struct SshTransport {
    command_timeout: Duration,
}

impl SshTransport {
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }

    fn session_config(&self, target: &DeploymentTarget) -> SessionConfig {
        let config = SessionConfig::new(&target.host, &target.user)
            .port(target.port)
            .known_hosts(target.known_hosts)
            .command_timeout(self.command_timeout);
        match &target.known_hosts_file {
            Some(path) => config.known_hosts_path(path),
            None => config,
        }
    }

    async fn open(&self, target: &DeploymentTarget, phase: Phase) -> Result<Session, TransportError> {
        tracing::debug!("Opening SSH session to {} for {}", target.address(), phase);
        Session::connect(self.session_config(target), &target.credential)
            .await
            .map_err(|e| TransportError::from_ssh(phase, e))
    }

    async fn close(session: Session, target: &DeploymentTarget) {
        if let Err(e) = session.disconnect().await {
            tracing::warn!("SSH disconnect from {} failed: {}", target.address(), e);
        }
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn transfer(
        &self,
        target: &DeploymentTarget,
        artifact: &BuildArtifact,
    ) -> Result<TransferResult, TransportError> {
        let started = Instant::now();
        let archive = pack(artifact)
            .await
            .map_err(|e| TransportError::new(Phase::Copy, TransportCause::Io(e.to_string())))?;

        let session = self.open(target, Phase::Copy).await?;
        let result = session.upload_tar(&target.remote_path, &archive).await;
        Self::close(session, target).await;

        let output = result.map_err(|e| TransportError::from_ssh(Phase::Copy, e))?;
        if !output.success() {
            return Err(TransportError::new(
                Phase::Copy,
                TransportCause::Remote(format!(
                    "tar exited with code {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                )),
            ));
        }

        Ok(TransferResult {
            files: artifact.file_count,
            bytes: archive.len() as u64,
            elapsed: started.elapsed(),
        })
    }

    async fn exec_remote(
        &self,
        target: &DeploymentTarget,
        command: &str,
    ) -> Result<CommandResult, TransportError> {
        let session = self.open(target, Phase::Restart).await?;
        let result = session.exec(command).await;
        Self::close(session, target).await;

        let output = result.map_err(|e| TransportError::from_ssh(Phase::Restart, e))?;
        let combined = match (output.stdout.trim_end(), output.stderr.trim_end()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        };
        Ok(CommandResult::new(output.exit_code, combined))
    }
}
