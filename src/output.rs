// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes, and renders deploy events.

use crate::deploy::{DeployEvent, DeployState, EventSink};
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "success",
                    message,
                    duration_secs: if self.start_time.is_some() {
                        Some(self.elapsed_secs())
                    } else {
                        None
                    },
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print a warning to stderr.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Warning: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "warning",
                    message,
                    duration_secs: None,
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: if self.start_time.is_some() {
                        Some(self.elapsed_secs())
                    } else {
                        None
                    },
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

/// Progress line for a state transition, or `None` if it is not shown.
fn progress_line(event: &DeployEvent) -> Option<String> {
    let line = match event.state {
        DeployState::Idle => return None,
        DeployState::Building => "  → Building artifact...".to_string(),
        DeployState::Resolving => "  → Resolving target...".to_string(),
        DeployState::Transferring => match event.attempt {
            Some(attempt) if attempt > 1 => {
                format!("  → Copying artifact (attempt {attempt})...")
            }
            _ => "  → Copying artifact...".to_string(),
        },
        DeployState::Restarting => "  → Restarting...".to_string(),
        DeployState::Succeeded | DeployState::Failed => return None,
    };
    Some(line)
}

impl EventSink for Output {
    fn emit(&self, event: &DeployEvent) {
        match self.mode {
            OutputMode::Normal => {
                if let Some(line) = progress_line(event) {
                    println!("{line}");
                }
            }
            OutputMode::Quiet => {}
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(event) {
                    println!("{json}");
                }
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RunId, TargetId};

    fn event(state: DeployState) -> DeployEvent {
        DeployEvent::new(&RunId::generate(), &TargetId::new("prod").unwrap(), state)
    }

    #[test]
    fn terminal_and_idle_states_have_no_progress_line() {
        assert!(progress_line(&event(DeployState::Idle)).is_none());
        assert!(progress_line(&event(DeployState::Succeeded)).is_none());
        assert!(progress_line(&event(DeployState::Failed)).is_none());
    }

    #[test]
    fn retried_copy_shows_attempt_number() {
        let first = progress_line(&event(DeployState::Transferring).with_attempt(1)).unwrap();
        let retry = progress_line(&event(DeployState::Transferring).with_attempt(3)).unwrap();

        assert_eq!(first, "  → Copying artifact...");
        assert_eq!(retry, "  → Copying artifact (attempt 3)...");
    }
}
