// ABOUTME: Command module aggregator for the ferry CLI.
// ABOUTME: Re-exports deploy, targets, and history command handlers.

mod deploy;
mod history;
mod targets;

pub use deploy::{DeployArgs, deploy};
pub use history::history;
pub use targets::targets;
