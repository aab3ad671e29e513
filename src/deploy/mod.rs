// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports the orchestrator, state markers, events, locks, and the attempt log.

mod attempt;
mod deployment;
mod error;
mod events;
mod lock;
mod orchestrator;
mod retry;
mod state;
mod transitions;

pub use attempt::{
    ATTEMPT_LOG_FILE, AttemptLog, DEFAULT_RETAINED_ATTEMPTS, DeploymentAttempt, Outcome,
};
pub use deployment::Deployment;
pub use error::{ConflictError, DeployError, DeployErrorKind};
pub use events::{DeployEvent, EventSink, FanoutSink, JsonLinesSink, MemorySink, TracingSink};
pub use lock::{LockInfo, TargetLock, TargetLocks};
pub use orchestrator::{Orchestrator, RunOptions, RunReport};
pub use retry::RetryPolicy;
pub use state::{Built, DeployState, Initialized, Resolved, Restarted, Transferred};
pub use transitions::TransitionResult;
