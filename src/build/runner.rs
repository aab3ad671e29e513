// ABOUTME: External command runner used for build steps.
// ABOUTME: The default runner executes each step through `sh -c` and captures its output.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Result of one build command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Exit code, or None if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, as shown in error reports.
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim_end(), self.stderr.trim_end()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Executes a single shell command for the builder.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        working_dir: &Path,
        env: &HashMap<String, String>,
    ) -> std::io::Result<CommandOutcome>;
}

/// Runs commands with the system shell.
#[derive(Debug, Default, Clone)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        working_dir: &Path,
        env: &HashMap<String, String>,
    ) -> std::io::Result<CommandOutcome> {
        tracing::info!(target: "ferry::build", "Running `{}` in {}", command, working_dir.display());

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let outcome = CommandOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        for line in outcome.stdout.lines() {
            tracing::debug!(target: "ferry::build", stream = "stdout", "{}", line);
        }
        for line in outcome.stderr.lines() {
            tracing::debug!(target: "ferry::build", stream = "stderr", "{}", line);
        }

        Ok(outcome)
    }
}
