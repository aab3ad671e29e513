// ABOUTME: Drives one deployment run through build, resolve, transfer, and restart.
// ABOUTME: Owns retries, cancellation, per-target locking, events, and the attempt record.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::build::{BuildArtifact, BuildSpec, Builder, ShellRunner};
use crate::config::Config;
use crate::secrets::{ChainSecretStore, SecretStore};
use crate::transport::{CommandResult, TransferResult, Transport};
use crate::types::{RunId, TargetId};

use super::Deployment;
use super::attempt::{AttemptLog, DeploymentAttempt, Outcome};
use super::error::DeployError;
use super::events::{DeployEvent, EventSink, TracingSink};
use super::lock::{TargetLock, TargetLocks};
use super::retry::RetryPolicy;
use super::state::{DeployState, Resolved, Transferred};

/// Per-run knobs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Stop after resolving the target.
    pub dry_run: bool,
    pub retry: RetryPolicy,
    /// Budget for all transport work in a run, copies and backoff and restart
    /// together, counted from the first copy.
    pub timeout: Duration,
    /// How long to wait for another run on the same target.
    pub lock_timeout: Duration,
    /// Break a live lock file held by another process.
    pub force: bool,
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(300),
            lock_timeout: Duration::from_secs(10),
            force: false,
            cancel: CancellationToken::new(),
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        let defaults = &config.defaults;
        Self {
            retry: RetryPolicy::from_config(defaults.retries, &defaults.backoff),
            timeout: defaults.timeout,
            lock_timeout: defaults.lock_timeout,
            ..Self::default()
        }
    }
}

/// Result of one run.
#[derive(Debug)]
pub struct RunReport {
    pub attempt: DeploymentAttempt,
    /// State the run was in when it failed.
    pub failed_at: Option<DeployState>,
    pub artifact: Option<BuildArtifact>,
    pub transfer: Option<TransferResult>,
    pub restart: Option<CommandResult>,
    pub error: Option<DeployError>,
    /// Non-fatal problems, such as an attempt log that could not be written.
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Terminal state of the run.
    pub fn state(&self) -> DeployState {
        if self.succeeded() {
            DeployState::Succeeded
        } else {
            DeployState::Failed
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.attempt.run_id
    }

    /// Process exit code: 0 on success, the failure class code otherwise.
    pub fn exit_code(&self) -> i32 {
        self.error.as_ref().map_or(0, DeployError::exit_code)
    }
}

/// Runs deployments. Share one instance (behind an `Arc`) across concurrent
/// runs so they see the same lock table and attempt log.
pub struct Orchestrator {
    config: Arc<Config>,
    builder: Builder,
    secrets: Arc<dyn SecretStore>,
    transport: Arc<dyn Transport>,
    events: Arc<dyn EventSink>,
    attempts: Arc<AttemptLog>,
    locks: Arc<TargetLocks>,
}

impl Orchestrator {
    /// Orchestrator with a shell builder, the default secret store, tracing
    /// events, and in-memory attempts and locks.
    pub fn new(config: Arc<Config>, transport: Arc<dyn Transport>) -> Self {
        let secrets = Arc::new(ChainSecretStore::new(config.root.clone()));
        Self {
            config,
            builder: Builder::new(Arc::new(ShellRunner)),
            secrets,
            transport,
            events: Arc::new(TracingSink),
            attempts: Arc::new(AttemptLog::new()),
            locks: Arc::new(TargetLocks::new()),
        }
    }

    pub fn with_builder(mut self, builder: Builder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_attempts(mut self, attempts: Arc<AttemptLog>) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_locks(mut self, locks: Arc<TargetLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn attempts(&self) -> &AttemptLog {
        &self.attempts
    }

    /// Run one deployment of `target_id` to a terminal state.
    ///
    /// Never panics on deployment failure: the outcome, including the
    /// classified error, is in the returned report.
    pub async fn run(&self, target_id: &TargetId, options: &RunOptions) -> RunReport {
        let mut run = Run::new(target_id.clone(), options);

        let mut record = DeploymentAttempt::start(run.run_id.clone(), target_id.clone());
        record.dry_run = options.dry_run;
        self.attempts.begin(record);
        self.events
            .emit(&DeployEvent::new(&run.run_id, target_id, DeployState::Idle));

        let result = self.drive(&mut run).await;

        let (terminal, error) = match result {
            Ok(()) => (DeployState::Succeeded, None),
            Err(e) => (DeployState::Failed, Some(e)),
        };
        let mut event = DeployEvent::new(&run.run_id, target_id, terminal);
        if let Some(e) = &error {
            event = event.with_error(e.to_string());
        }
        self.events.emit(&event);

        let mut warnings = Vec::new();
        let attempt = match self.attempts.finish(&run.run_id, error.as_ref()) {
            Some(attempt) => attempt,
            None => {
                let mut attempt = DeploymentAttempt::start(run.run_id.clone(), target_id.clone());
                attempt.finish(error.as_ref());
                attempt
            }
        };
        if let Err(e) = self.attempts.persist(&attempt) {
            tracing::warn!("Failed to append attempt record: {}", e);
            warnings.push(format!("failed to append attempt record: {}", e));
        }

        // Held until the attempt is recorded.
        drop(run.lock.take());

        RunReport {
            attempt,
            failed_at: error.as_ref().map(|_| run.state),
            artifact: run.artifact,
            transfer: run.transfer,
            restart: run.restart,
            error,
            warnings,
        }
    }

    async fn drive(&self, run: &mut Run<'_>) -> Result<(), DeployError> {
        self.enter(run, DeployState::Building, None)?;
        let spec = BuildSpec::from_config(&self.config)?;
        let built = Deployment::new(run.target_id.clone())
            .build(&self.builder, &spec)
            .await?;
        let hash = built.artifact().hash.to_string();
        self.attempts
            .update(&run.run_id, |a| a.artifact_hash = Some(hash));
        run.artifact = Some(built.artifact().clone());

        self.enter(run, DeployState::Resolving, None)?;
        let resolved = built.resolve(&self.config, self.secrets.as_ref())?;

        if run.options.dry_run {
            tracing::info!(
                "Dry run: would copy {} files to {}:{}",
                resolved.artifact().file_count,
                resolved.target().address(),
                resolved.target().remote_path
            );
            return Ok(());
        }

        let lock = self
            .locks
            .acquire(&run.target_id, run.options.lock_timeout, run.options.force)
            .await?;
        run.lock = Some(lock);

        let transferred = self.transfer_with_retry(run, resolved).await?;
        run.transfer = Some(transferred.transfer().clone());

        self.enter(run, DeployState::Restarting, None)?;
        self.attempts.update(&run.run_id, |a| a.restart_attempts = 1);
        let restarted = transferred
            .restart(self.transport.as_ref(), run.transport_deadline())
            .await
            .inspect_err(|e| {
                if let DeployError::Restart { output, .. } = e {
                    tracing::debug!(target: "ferry::restart", "{}", output);
                }
            })?;
        run.restart = Some(restarted.restart().clone());

        Ok(())
    }

    async fn transfer_with_retry(
        &self,
        run: &mut Run<'_>,
        resolved: Deployment<Resolved>,
    ) -> Result<Deployment<Transferred>, DeployError> {
        let policy = run.options.retry;
        let deadline = run.transport_deadline();
        let mut deployment = resolved;
        let mut attempt = 1;

        loop {
            self.enter(run, DeployState::Transferring, Some(attempt))?;
            self.attempts
                .update(&run.run_id, |a| a.transfer_attempts = attempt);

            let error = match deployment
                .transfer(self.transport.as_ref(), deadline)
                .await
            {
                Ok(transferred) => return Ok(transferred),
                Err((back, error)) => {
                    deployment = back;
                    error
                }
            };

            let delay = policy.delay_after(attempt);
            if !policy.should_retry(attempt) || Instant::now() + delay >= deadline {
                return Err(DeployError::transport(error, attempt));
            }

            tracing::warn!(
                "Copy attempt {}/{} to {} failed: {}; retrying in {:?}",
                attempt,
                policy.max_attempts,
                run.target_id,
                error,
                delay
            );
            self.attempts
                .update(&run.run_id, |a| a.outcome = Outcome::Retrying);

            tokio::select! {
                _ = run.options.cancel.cancelled() => {
                    return Err(DeployError::Cancelled { state: run.state });
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    /// Transition boundary: honor cancellation, then record the new state.
    fn enter(
        &self,
        run: &mut Run<'_>,
        state: DeployState,
        attempt: Option<u32>,
    ) -> Result<(), DeployError> {
        if run.options.cancel.is_cancelled() {
            return Err(DeployError::Cancelled { state: run.state });
        }
        run.state = state;
        let mut event = DeployEvent::new(&run.run_id, &run.target_id, state);
        if let Some(attempt) = attempt {
            event = event.with_attempt(attempt);
        }
        self.events.emit(&event);
        Ok(())
    }
}

/// Mutable bookkeeping for a single run.
struct Run<'a> {
    run_id: RunId,
    target_id: TargetId,
    options: &'a RunOptions,
    state: DeployState,
    lock: Option<TargetLock>,
    /// Set when the first copy starts; shared by every later transport call.
    deadline: Option<Instant>,
    artifact: Option<BuildArtifact>,
    transfer: Option<TransferResult>,
    restart: Option<CommandResult>,
}

impl<'a> Run<'a> {
    fn new(target_id: TargetId, options: &'a RunOptions) -> Self {
        Self {
            run_id: RunId::generate(),
            target_id,
            options,
            state: DeployState::Idle,
            lock: None,
            deadline: None,
            artifact: None,
            transfer: None,
            restart: None,
        }
    }

    fn transport_deadline(&mut self) -> Instant {
        let budget = self.options.timeout;
        *self
            .deadline
            .get_or_insert_with(|| Instant::now() + budget)
    }
}

