// ABOUTME: Deployment events emitted on every state transition.
// ABOUTME: Sinks for tracing, JSON lines, in-memory collection, and fan-out.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

use crate::types::{RunId, TargetId};

use super::state::DeployState;

/// One state transition of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployEvent {
    pub timestamp: DateTime<Utc>,
    pub run_id: RunId,
    pub target_id: TargetId,
    pub state: DeployState,
    /// Copy attempt number, set on `Transferring` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeployEvent {
    pub fn new(run_id: &RunId, target_id: &TargetId, state: DeployState) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id: run_id.clone(),
            target_id: target_id.clone(),
            state,
            attempt: None,
            error: None,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Receives deployment events. Called synchronously on the run's task.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DeployEvent);
}

/// Emits each event as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DeployEvent) {
        match (&event.error, event.state) {
            (Some(error), _) => tracing::error!(
                target: "ferry::deploy",
                run_id = %event.run_id,
                target_id = %event.target_id,
                state = %event.state,
                attempt = event.attempt,
                error = %error,
                "deployment transition"
            ),
            (None, DeployState::Transferring) if event.attempt.is_some_and(|a| a > 1) => {
                tracing::warn!(
                    target: "ferry::deploy",
                    run_id = %event.run_id,
                    target_id = %event.target_id,
                    state = %event.state,
                    attempt = event.attempt,
                    "retrying transfer"
                )
            }
            (None, _) => tracing::info!(
                target: "ferry::deploy",
                run_id = %event.run_id,
                target_id = %event.target_id,
                state = %event.state,
                attempt = event.attempt,
                "deployment transition"
            ),
        }
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: &DeployEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to serialize deploy event: {}", e);
                return;
            }
        };
        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            tracing::warn!("Failed to write deploy event: {}", e);
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DeployEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeployEvent> {
        self.events.lock().clone()
    }

    /// Every emitted state, in order.
    pub fn states(&self) -> Vec<DeployState> {
        self.events.lock().iter().map(|e| e.state).collect()
    }

    /// States with consecutive repeats (retry events) collapsed.
    pub fn transitions(&self) -> Vec<DeployState> {
        let mut states = self.states();
        states.dedup();
        states
    }

    /// Events of a single run.
    pub fn for_run(&self, run_id: &RunId) -> Vec<DeployEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| &e.run_id == run_id)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &DeployEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Forwards every event to each inner sink.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &DeployEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
