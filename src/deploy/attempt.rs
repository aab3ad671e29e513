// ABOUTME: Deployment attempt records and the append-only attempt log.
// ABOUTME: One record per run, persisted as JSON lines once the run is terminal.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::types::{RunId, TargetId};

use super::error::{DeployError, DeployErrorKind};

/// File name of the attempt log inside the state directory.
pub const ATTEMPT_LOG_FILE: &str = "attempts.jsonl";

/// Completed attempts kept in memory by default. Older ones are only on disk.
pub const DEFAULT_RETAINED_ATTEMPTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// In flight, no copy failure yet.
    Running,
    /// In flight, at least one copy attempt failed.
    Retrying,
    Success,
    Failure,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::Failure)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Outcome::Running => "running",
            Outcome::Retrying => "retrying",
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// Record of one end-to-end run for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentAttempt {
    pub run_id: RunId,
    pub target_id: TargetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_hash: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Outcome,
    #[serde(default)]
    pub transfer_attempts: u32,
    #[serde(default)]
    pub restart_attempts: u32,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<DeployErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentAttempt {
    pub fn start(run_id: RunId, target_id: TargetId) -> Self {
        Self {
            run_id,
            target_id,
            artifact_hash: None,
            started_at: Utc::now(),
            finished_at: None,
            outcome: Outcome::Running,
            transfer_attempts: 0,
            restart_attempts: 0,
            dry_run: false,
            error_kind: None,
            error: None,
        }
    }

    /// Mark the attempt terminal.
    pub fn finish(&mut self, error: Option<&DeployError>) {
        self.finished_at = Some(Utc::now());
        match error {
            None => self.outcome = Outcome::Success,
            Some(err) => {
                self.outcome = Outcome::Failure;
                self.error_kind = Some(err.kind());
                self.error = Some(err.to_string());
            }
        }
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

/// Tracks in-flight attempts, keeps the most recent completed ones, and
/// appends terminal records to disk.
#[derive(Debug)]
pub struct AttemptLog {
    in_flight: Mutex<HashMap<RunId, DeploymentAttempt>>,
    completed: Mutex<VecDeque<DeploymentAttempt>>,
    retain: usize,
    path: Option<PathBuf>,
}

impl Default for AttemptLog {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            completed: Mutex::new(VecDeque::new()),
            retain: DEFAULT_RETAINED_ATTEMPTS,
            path: None,
        }
    }
}

impl AttemptLog {
    /// In-memory only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `count` completed attempts in memory (minimum 1).
    pub fn retaining(mut self, count: usize) -> Self {
        self.retain = count.max(1);
        self
    }

    /// Also append to `<state_dir>/attempts.jsonl`.
    pub fn with_state_dir(state_dir: &Path) -> Self {
        Self {
            path: Some(state_dir.join(ATTEMPT_LOG_FILE)),
            ..Self::default()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn begin(&self, attempt: DeploymentAttempt) {
        self.in_flight
            .lock()
            .insert(attempt.run_id.clone(), attempt);
    }

    /// Apply `change` to an in-flight attempt.
    pub fn update<F>(&self, run_id: &RunId, change: F)
    where
        F: FnOnce(&mut DeploymentAttempt),
    {
        if let Some(attempt) = self.in_flight.lock().get_mut(run_id) {
            change(attempt);
        }
    }

    /// Mark a run's attempt terminal and move it to the completed list.
    pub fn finish(&self, run_id: &RunId, error: Option<&DeployError>) -> Option<DeploymentAttempt> {
        let mut attempt = self.in_flight.lock().remove(run_id)?;
        attempt.finish(error);
        let mut completed = self.completed.lock();
        completed.push_back(attempt.clone());
        while completed.len() > self.retain {
            completed.pop_front();
        }
        Some(attempt)
    }

    /// Append a record to the attempt log file, if one is configured.
    pub fn persist(&self, attempt: &DeploymentAttempt) -> io::Result<()> {
        match &self.path {
            Some(path) => append_line(path, attempt),
            None => Ok(()),
        }
    }

    pub fn in_flight(&self, run_id: &RunId) -> Option<DeploymentAttempt> {
        self.in_flight.lock().get(run_id).cloned()
    }

    /// Most recent completed attempts, oldest first.
    pub fn completed(&self) -> Vec<DeploymentAttempt> {
        self.completed.lock().iter().cloned().collect()
    }

    /// Read every record from an attempt log file. A missing file is empty.
    pub fn read_file(path: &Path) -> io::Result<Vec<DeploymentAttempt>> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut attempts = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(attempt) => attempts.push(attempt),
                Err(e) => tracing::warn!(
                    "Skipping malformed attempt record at {}:{}: {}",
                    path.display(),
                    number + 1,
                    e
                ),
            }
        }
        Ok(attempts)
    }
}

fn append_line(path: &Path, attempt: &DeploymentAttempt) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(attempt).map_err(io::Error::other)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}
