// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use tokio::time::Instant;

use crate::build::{BuildSpec, Builder};
use crate::config::Config;
use crate::resolve;
use crate::secrets::SecretStore;
use crate::transport::{Phase, Transport, TransportError};

use super::Deployment;
use super::error::DeployError;
use super::state::{Built, Initialized, Resolved, Restarted, Transferred};

/// Result type for transitions whose failure hands the deployment back,
/// so the caller can retry from the same state.
pub type TransitionResult<T, S, E = DeployError> = Result<Deployment<T>, (Deployment<S>, E)>;

impl<S> Deployment<S> {
    fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            target_id: self.target_id,
            state,
        }
    }
}

// =============================================================================
// Initialized -> Built
// =============================================================================

impl Deployment<Initialized> {
    /// Run the build commands and verify the artifact.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Build` on the first failing command or an
    /// empty or missing artifact directory.
    #[must_use = "deployment state must be used"]
    pub async fn build(
        self,
        builder: &Builder,
        spec: &BuildSpec,
    ) -> Result<Deployment<Built>, DeployError> {
        let artifact = builder.build(spec).await?;
        tracing::debug!(
            "Built {} ({} files, {} bytes, {})",
            artifact.path.display(),
            artifact.file_count,
            artifact.total_size,
            artifact.hash.short()
        );
        Ok(self.transition(Built { artifact }))
    }
}

// =============================================================================
// Built -> Resolved
// =============================================================================

impl Deployment<Built> {
    /// Resolve the target's address, restart command, and credential.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Resolution` if the target is unknown, a field
    /// is missing, or the secret store cannot supply the credential.
    #[must_use = "deployment state must be used"]
    pub fn resolve(
        self,
        config: &Config,
        secrets: &dyn SecretStore,
    ) -> Result<Deployment<Resolved>, DeployError> {
        let target = resolve::resolve(&self.target_id, config, secrets)?;
        Ok(Deployment {
            target_id: self.target_id,
            state: Resolved {
                artifact: self.state.artifact,
                target,
            },
        })
    }
}

// =============================================================================
// Resolved -> Transferred
// =============================================================================

impl Deployment<Resolved> {
    /// Copy the artifact to the target, finishing before `deadline`.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)` on failure so the copy can be retried. A
    /// deadline that has already passed fails with a timeout without
    /// contacting the target.
    #[must_use = "deployment state must be used"]
    pub async fn transfer<T: Transport + ?Sized>(
        self,
        transport: &T,
        deadline: Instant,
    ) -> TransitionResult<Transferred, Resolved, TransportError> {
        if Instant::now() >= deadline {
            return Err((self, TransportError::timeout(Phase::Copy)));
        }
        let result = tokio::time::timeout_at(
            deadline,
            transport.transfer(&self.state.target, &self.state.artifact),
        )
        .await
        .unwrap_or_else(|_| Err(TransportError::timeout(Phase::Copy)));

        match result {
            Ok(transfer) => {
                tracing::debug!(
                    "Copied {} files ({} bytes) to {} in {:?}",
                    transfer.files,
                    transfer.bytes,
                    self.state.target.address(),
                    transfer.elapsed
                );
                let Resolved { artifact, target } = self.state;
                Ok(Deployment {
                    target_id: self.target_id,
                    state: Transferred {
                        artifact,
                        target,
                        transfer,
                    },
                })
            }
            Err(e) => Err((self, e)),
        }
    }
}

// =============================================================================
// Transferred -> Restarted
// =============================================================================

impl Deployment<Transferred> {
    /// Run the target's restart command, finishing before `deadline`.
    ///
    /// Consumes the resolved target, so the credential is released whether
    /// the restart succeeds or not.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Restart` with the captured output on a non-zero
    /// exit, or `DeployError::Transport` (phase restart) if the command could
    /// not be run. Neither is retryable.
    #[must_use = "deployment state must be used"]
    pub async fn restart<T: Transport + ?Sized>(
        self,
        transport: &T,
        deadline: Instant,
    ) -> Result<Deployment<Restarted>, DeployError> {
        let Transferred {
            artifact,
            target,
            transfer,
        } = self.state;

        let result = if Instant::now() >= deadline {
            Err(TransportError::timeout(Phase::Restart))
        } else {
            tokio::time::timeout_at(
                deadline,
                transport.exec_remote(&target, &target.restart_command),
            )
            .await
            .unwrap_or_else(|_| Err(TransportError::timeout(Phase::Restart)))
        };
        let result = result.map_err(|e| DeployError::transport(e, 1))?;
        drop(target);

        if !result.ok {
            return Err(DeployError::Restart {
                exit_code: result.exit_code,
                output: result.output,
            });
        }

        Ok(Deployment {
            target_id: self.target_id,
            state: Restarted {
                artifact,
                transfer,
                restart: result,
            },
        })
    }
}
