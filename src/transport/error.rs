// ABOUTME: Transport error types.
// ABOUTME: Every error carries the phase it happened in and a classified cause.

use std::fmt;
use thiserror::Error;

/// Which transport step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Copy,
    Restart,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Copy => write!(f, "copy"),
            Phase::Restart => write!(f, "restart"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportCause {
    #[error("timeout")]
    Timeout,

    #[error("connection: {0}")]
    Connection(String),

    #[error("authentication: {0}")]
    Auth(String),

    #[error("host key rejected: {0}")]
    HostKeyRejected(String),

    #[error("remote: {0}")]
    Remote(String),

    #[error("I/O: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport {phase} failed: {cause}")]
pub struct TransportError {
    pub phase: Phase,
    pub cause: TransportCause,
}

impl TransportError {
    pub fn new(phase: Phase, cause: TransportCause) -> Self {
        Self { phase, cause }
    }

    pub fn timeout(phase: Phase) -> Self {
        Self::new(phase, TransportCause::Timeout)
    }

    /// Classify an SSH error for the given phase.
    pub fn from_ssh(phase: Phase, err: crate::ssh::Error) -> Self {
        use crate::ssh::Error;

        let cause = match err {
            Error::Connection(msg) => TransportCause::Connection(msg),
            Error::AuthenticationFailed => TransportCause::Auth("no valid credentials".to_string()),
            Error::InvalidKey(msg) => TransportCause::Auth(msg),
            Error::Key(e) => TransportCause::Auth(e.to_string()),
            Error::HostKeyRejected(reason) => TransportCause::HostKeyRejected(reason),
            Error::CommandTimeout(_) => TransportCause::Timeout,
            Error::ChannelClosed => TransportCause::Connection("connection reset".to_string()),
            Error::CommandFailed(msg) => TransportCause::Remote(msg),
            Error::Protocol(e) => TransportCause::Connection(e.to_string()),
            Error::Io(e) => TransportCause::Io(e.to_string()),
        };
        Self::new(phase, cause)
    }
}
