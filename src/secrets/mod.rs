// ABOUTME: Secret store abstraction and credential handling.
// ABOUTME: Credentials stay in memory, are never logged, and are zeroized on drop.

mod credential;
mod error;
mod reference;
mod store;

pub use credential::Credential;
pub use error::{Result, SecretError};
pub use reference::SecretRef;
pub use store::{ChainSecretStore, EnvSecretStore, FileSecretStore, MemorySecretStore, SecretStore};
