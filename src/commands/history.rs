// ABOUTME: History command implementation.
// ABOUTME: Reads the attempt log from the state directory and prints recent attempts.

use ferry::config::Config;
use ferry::deploy::{ATTEMPT_LOG_FILE, AttemptLog};
use ferry::error::Result;
use ferry::output::{Output, OutputMode};

pub fn history(config: &Config, target: Option<&str>, limit: usize, output: &Output) -> Result<()> {
    let path = config.state_dir().join(ATTEMPT_LOG_FILE);
    let mut attempts = AttemptLog::read_file(&path)?;
    if let Some(target) = target {
        attempts.retain(|a| a.target_id.as_str() == target);
    }
    let skip = attempts.len().saturating_sub(limit);

    if attempts.is_empty() {
        output.progress("No recorded attempts");
        return Ok(());
    }

    for attempt in attempts.iter().skip(skip) {
        match output.mode() {
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(attempt) {
                    println!("{json}");
                }
            }
            OutputMode::Quiet | OutputMode::Normal => {
                let kind = attempt
                    .error_kind
                    .map(|k| format!(" [{}]", k))
                    .unwrap_or_default();
                println!(
                    "{}  {:<16} {:<8}{}  copies={} {}",
                    attempt.started_at.format("%Y-%m-%d %H:%M:%S"),
                    attempt.target_id,
                    attempt.outcome,
                    kind,
                    attempt.transfer_attempts,
                    attempt.error.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}
