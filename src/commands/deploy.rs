// ABOUTME: Deploy command implementation.
// ABOUTME: Wires config, SSH transport, locks, and the attempt log into one orchestrator run.

use ferry::config::Config;
use ferry::deploy::{
    AttemptLog, DeployError, FanoutSink, Orchestrator, RunOptions, TargetLocks, TracingSink,
};
use ferry::diagnostics::{Diagnostics, Warning};
use ferry::error::{Error, Result};
use ferry::output::Output;
use ferry::transport::SshTransport;
use ferry::types::TargetId;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Command-line overrides for one deploy.
#[derive(Debug, Clone, Default)]
pub struct DeployArgs {
    pub target: String,
    pub dry_run: bool,
    pub retries: Option<u32>,
    pub timeout: Option<u64>,
    pub force: bool,
}

/// Deploy to a single target.
pub async fn deploy(
    config: Config,
    args: DeployArgs,
    mut output: Output,
    cancel: CancellationToken,
) -> Result<()> {
    let target_id = TargetId::new(&args.target)
        .map_err(|e| Error::UnknownTarget(format!("{}: {}", args.target, e)))?;

    output.start_timer();
    let mut diag = Diagnostics::default();

    let policy = config
        .target(&target_id)
        .and_then(|t| t.known_hosts)
        .unwrap_or(config.defaults.known_hosts);
    if policy.is_insecure() {
        diag.warn(Warning::insecure_host_key(format!(
            "target {} accepts any host key (known_hosts: insecure-skip)",
            target_id
        )));
    }

    let options = run_options(&config, &args, cancel);
    let state_dir = config.state_dir();
    let transport = SshTransport::new(options.timeout);

    let output = Arc::new(output);
    let events = FanoutSink::new()
        .with(Arc::new(TracingSink))
        .with(output.clone());

    let orchestrator = Orchestrator::new(Arc::new(config), Arc::new(transport))
        .with_events(Arc::new(events))
        .with_attempts(Arc::new(AttemptLog::with_state_dir(&state_dir)))
        .with_locks(Arc::new(TargetLocks::with_state_dir(&state_dir)));

    if args.dry_run {
        output.progress(&format!("Dry run for {}", target_id));
    } else {
        output.progress(&format!("Deploying to {}", target_id));
    }

    let report = orchestrator.run(&target_id, &options).await;

    for warning in &report.warnings {
        diag.warn(Warning::attempt_log(warning.clone()));
    }
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    if let Some(error) = report.error {
        if let DeployError::Restart { output: log, .. } = &error
            && !log.is_empty()
        {
            output.progress(log.trim_end());
        }
        return Err(error.into());
    }

    let summary = match &report.artifact {
        Some(artifact) => format!(
            "{} files, {}",
            artifact.file_count,
            artifact.hash.short()
        ),
        None => "no artifact".to_string(),
    };
    if args.dry_run {
        output.success(&format!(
            "Dry run complete: {} ready for {}",
            summary, target_id
        ));
    } else {
        output.success(&format!("Deployed {} to {}", summary, target_id));
    }
    Ok(())
}

fn run_options(config: &Config, args: &DeployArgs, cancel: CancellationToken) -> RunOptions {
    let mut options = RunOptions::from_config(config);
    if let Some(retries) = args.retries {
        options.retry = options.retry.with_max_attempts(retries);
    }
    if let Some(secs) = args.timeout {
        options.timeout = Duration::from_secs(secs);
    }
    options.dry_run = args.dry_run;
    options.force = args.force;
    options.cancel = cancel;
    options
}
