// ABOUTME: In-memory credential material (SSH private keys).
// ABOUTME: Wraps bytes in secrecy::Secret so they are redacted and zeroized.

use secrecy::{ExposeSecret, Secret};
use std::fmt;

/// Opaque secret bytes fetched from a secret store.
///
/// `Debug` never prints the contents. The bytes are zeroized when the
/// credential is dropped, which happens at the end of each transport session.
pub struct Credential {
    material: Secret<Vec<u8>>,
}

impl Credential {
    /// Take ownership of raw secret bytes.
    pub fn new(material: Vec<u8>) -> Self {
        Self {
            material: Secret::new(material),
        }
    }

    /// Borrow the plaintext for the duration of `action`.
    pub fn use_secret<F, R>(&self, action: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        action(self.material.expose_secret())
    }

    pub fn is_empty(&self) -> bool {
        self.material.expose_secret().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}
