// ABOUTME: SSH client module for remote server connections.
// ABOUTME: In-memory key authentication with a configurable known_hosts policy.

mod client;
mod error;

pub use client::{CommandOutput, Session, SessionConfig, shell_quote};
pub use error::{Error, Result};
