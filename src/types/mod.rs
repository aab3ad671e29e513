// ABOUTME: Validated domain types shared across ferry.
// ABOUTME: Target identifiers, run identifiers, and content hashes.

mod content_hash;
mod run_id;
mod target_id;

pub use content_hash::ContentHash;
pub use run_id::RunId;
pub use target_id::{TargetId, TargetIdError};
