// ABOUTME: Target resolver: turns a target id into a fully specified deployment target.
// ABOUTME: Pure lookup over config and the secret store; performs no network I/O.

mod error;
mod target;

pub use error::{ResolutionError, ResolutionErrorKind};
pub use target::{DeploymentTarget, resolve};
