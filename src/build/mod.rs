// ABOUTME: Artifact builder adapter.
// ABOUTME: Runs the configured build commands and verifies the artifact directory.

mod artifact;
mod builder;
mod error;
mod runner;

pub use artifact::{BuildArtifact, hash_entry, walk_files};
pub use builder::{BuildSpec, Builder};
pub use error::BuildError;
pub use runner::{CommandOutcome, CommandRunner, ShellRunner};
