// ABOUTME: Secret store trait and the built-in backends.
// ABOUTME: Environment, file, chained dispatch by scheme, and in-memory.

use super::credential::Credential;
use super::error::{Result, SecretError};
use super::reference::SecretRef;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, Secret};
use std::collections::HashMap;
use std::path::PathBuf;

/// Read-only source of credential material.
///
/// Implementations must tolerate concurrent reads from independent runs.
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, reference: &SecretRef) -> Result<Credential>;
}

/// Reads `env:NAME` references from the process environment.
#[derive(Debug, Default)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get_secret(&self, reference: &SecretRef) -> Result<Credential> {
        let SecretRef::Env(name) = reference else {
            return Err(SecretError::InvalidReference(reference.to_string()));
        };

        match std::env::var_os(name) {
            Some(value) if !value.is_empty() => {
                Ok(Credential::new(value.into_encoded_bytes()))
            }
            _ => Err(SecretError::NotFound(reference.to_string())),
        }
    }
}

/// Reads `file:PATH` references, resolving relative paths against `base_dir`.
#[derive(Debug)]
pub struct FileSecretStore {
    base_dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl SecretStore for FileSecretStore {
    fn get_secret(&self, reference: &SecretRef) -> Result<Credential> {
        let SecretRef::File(path) = reference else {
            return Err(SecretError::InvalidReference(reference.to_string()));
        };

        let path = if path.is_absolute() {
            path.clone()
        } else {
            self.base_dir.join(path)
        };

        match std::fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => Ok(Credential::new(bytes)),
            Ok(_) => Err(SecretError::NotFound(reference.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SecretError::NotFound(reference.to_string()))
            }
            Err(e) => Err(SecretError::Unavailable {
                reference: reference.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Dispatches each reference to the backend for its scheme.
#[derive(Debug)]
pub struct ChainSecretStore {
    env: EnvSecretStore,
    file: FileSecretStore,
}

impl ChainSecretStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            env: EnvSecretStore,
            file: FileSecretStore::new(base_dir),
        }
    }
}

impl SecretStore for ChainSecretStore {
    fn get_secret(&self, reference: &SecretRef) -> Result<Credential> {
        match reference {
            SecretRef::Env(_) => self.env.get_secret(reference),
            SecretRef::File(_) => self.file.get_secret(reference),
        }
    }
}

/// In-memory store keyed by the rendered reference.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<String, Secret<Vec<u8>>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, reference: &SecretRef, material: impl Into<Vec<u8>>) {
        self.secrets
            .write()
            .insert(reference.to_string(), Secret::new(material.into()));
    }

    pub fn with_secret(self, reference: &SecretRef, material: impl Into<Vec<u8>>) -> Self {
        self.insert(reference, material);
        self
    }
}

impl std::fmt::Debug for MemorySecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySecretStore")
            .field("entries", &self.secrets.read().len())
            .finish()
    }
}

impl SecretStore for MemorySecretStore {
    fn get_secret(&self, reference: &SecretRef) -> Result<Credential> {
        self.secrets
            .read()
            .get(&reference.to_string())
            .map(|s| Credential::new(s.expose_secret().clone()))
            .ok_or_else(|| SecretError::NotFound(reference.to_string()))
    }
}
