// ABOUTME: Resolution error types.
// ABOUTME: Misconfiguration and unavailable secrets are reported separately.

use crate::types::TargetId;
use std::fmt;
use thiserror::Error;

/// Why a target could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionErrorKind {
    /// The target id is not present in the config.
    UnknownTarget,
    /// A required field is absent or empty.
    MissingField,
    /// A field is present but cannot be parsed.
    InvalidField,
    /// The secret store could not produce the referenced credential.
    SecretUnavailable,
}

impl fmt::Display for ResolutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionErrorKind::UnknownTarget => "unknown target",
            ResolutionErrorKind::MissingField => "missing field",
            ResolutionErrorKind::InvalidField => "invalid field",
            ResolutionErrorKind::SecretUnavailable => "secret unavailable",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("cannot resolve target {target}: {kind}: {detail}")]
pub struct ResolutionError {
    pub target: TargetId,
    pub kind: ResolutionErrorKind,
    pub detail: String,
}

impl ResolutionError {
    pub(crate) fn new(
        target: &TargetId,
        kind: ResolutionErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            target: target.clone(),
            kind,
            detail: detail.into(),
        }
    }

    pub(crate) fn missing(target: &TargetId, field: &str) -> Self {
        Self::new(target, ResolutionErrorKind::MissingField, field)
    }
}
