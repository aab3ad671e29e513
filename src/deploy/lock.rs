// ABOUTME: Per-target deploy lock so only one run copies to a target at a time.
// ABOUTME: In-process mutex per target plus an optional lock file for other processes.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

use crate::types::TargetId;

use super::error::{ConflictError, DeployError};

/// How often a contended lock file is re-checked.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Target being deployed.
    pub target: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(target: &TargetId) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            target: target.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Path to the lock file for a target.
    pub fn lock_path(state_dir: &Path, target: &TargetId) -> PathBuf {
        state_dir.join(format!("{}.lock", target))
    }
}

#[derive(Default)]
struct Slot {
    mutex: Arc<tokio::sync::Mutex<()>>,
    holder: Arc<Mutex<Option<LockInfo>>>,
}

/// Lock table shared by every run in this process.
#[derive(Default)]
pub struct TargetLocks {
    slots: Mutex<HashMap<TargetId, Slot>>,
    state_dir: Option<PathBuf>,
}

impl std::fmt::Debug for TargetLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetLocks")
            .field("state_dir", &self.state_dir)
            .finish_non_exhaustive()
    }
}

impl TargetLocks {
    /// In-process locking only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also take `<state_dir>/<target>.lock` so separate processes exclude each other.
    pub fn with_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            state_dir: Some(state_dir.into()),
        }
    }

    /// Acquire the lock for `target`, waiting at most `timeout`.
    ///
    /// `force` breaks a live lock file left by another process. Lock files
    /// older than one hour are broken automatically with a warning.
    pub async fn acquire(
        &self,
        target: &TargetId,
        timeout: Duration,
        force: bool,
    ) -> Result<TargetLock, DeployError> {
        let deadline = Instant::now() + timeout;
        let (mutex, holder) = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(target.clone()).or_default();
            (Arc::clone(&slot.mutex), Arc::clone(&slot.holder))
        };

        let guard = match tokio::time::timeout_at(deadline, mutex.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                return Err(ConflictError {
                    target: target.clone(),
                    waited: timeout,
                    holder: holder.lock().clone(),
                }
                .into());
            }
        };

        let info = LockInfo::new(target);
        let file = match &self.state_dir {
            Some(dir) => Some(acquire_file(dir, target, &info, deadline, timeout, force).await?),
            None => None,
        };

        *holder.lock() = Some(info);
        tracing::debug!("Acquired deploy lock for {}", target);

        Ok(TargetLock {
            target: target.clone(),
            file,
            holder,
            _guard: guard,
        })
    }
}

/// A held deploy lock that releases on drop.
pub struct TargetLock {
    target: TargetId,
    file: Option<PathBuf>,
    holder: Arc<Mutex<Option<LockInfo>>>,
    _guard: OwnedMutexGuard<()>,
}

impl std::fmt::Debug for TargetLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetLock")
            .field("target", &self.target)
            .field("file", &self.file)
            .finish()
    }
}

impl TargetLock {
    pub fn target(&self) -> &TargetId {
        &self.target
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        *self.holder.lock() = None;
        if let Some(path) = &self.file
            && let Err(e) = std::fs::remove_file(path)
        {
            tracing::warn!("Failed to remove lock file {}: {}", path.display(), e);
        }
        tracing::debug!("Released deploy lock for {}", self.target);
    }
}

async fn acquire_file(
    dir: &Path,
    target: &TargetId,
    info: &LockInfo,
    deadline: Instant,
    timeout: Duration,
    force: bool,
) -> Result<PathBuf, DeployError> {
    let lock_error = |reason: String| DeployError::Lock {
        target: target.clone(),
        reason,
    };

    std::fs::create_dir_all(dir)
        .map_err(|e| lock_error(format!("failed to create state directory: {}", e)))?;

    let path = LockInfo::lock_path(dir, target);
    let contents = serde_json::to_string(info)
        .map_err(|e| lock_error(format!("failed to serialize lock: {}", e)))?;
    let mut force = force;

    loop {
        // create_new fails if the file exists, so creation is the atomic test-and-set
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(contents.as_bytes())
                    .map_err(|e| lock_error(format!("failed to write lock file: {}", e)))?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(lock_error(format!("failed to create lock file: {}", e))),
        }

        let existing = read_lock_file(&path);
        let should_break = match &existing {
            Some(existing) if force => {
                tracing::warn!(
                    "Breaking lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                true
            }
            Some(existing) if existing.is_stale() => {
                tracing::warn!(
                    "Auto-breaking stale lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                true
            }
            Some(_) => false,
            None => {
                tracing::warn!("Lock info unreadable, breaking lock");
                true
            }
        };

        if should_break {
            force = false;
            match std::fs::remove_file(&path) {
                Ok(()) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(lock_error(format!(
                        "failed to remove stale lock file {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        if Instant::now() >= deadline {
            return Err(ConflictError {
                target: target.clone(),
                waited: timeout,
                holder: existing,
            }
            .into());
        }
        tokio::time::sleep(LOCK_POLL_INTERVAL).await;
    }
}

fn read_lock_file(path: &Path) -> Option<LockInfo> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}
