// ABOUTME: Per-target configuration: address, login, secret reference, restart command.
// ABOUTME: Parses address shorthand like "host", "user@host", "host:port", "user@host:port".

use super::KnownHostsPolicy;
use crate::secrets::SecretRef;
use serde::Deserialize;
use std::path::PathBuf;

/// Raw target entry as written in the config file.
///
/// Every field is optional here; the resolver reports which required
/// ones are missing so a misconfigured target fails with a precise error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub secret: Option<SecretRef>,
    #[serde(default)]
    pub remote_path: Option<String>,
    #[serde(default)]
    pub restart: Option<String>,
    #[serde(default)]
    pub known_hosts: Option<KnownHostsPolicy>,
    #[serde(default)]
    pub known_hosts_file: Option<PathBuf>,
}

/// A host address split from `[user@]host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
}

impl Address {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("host address cannot be empty".to_string());
        }

        let (user_part, rest) = if let Some(at_pos) = s.find('@') {
            (Some(&s[..at_pos]), &s[at_pos + 1..])
        } else {
            (None, s)
        };

        let (host, port) = if let Some(colon_pos) = rest.rfind(':') {
            let port_str = &rest[colon_pos + 1..];
            let port = port_str
                .parse::<u16>()
                .map_err(|_| format!("invalid port: {}", port_str))?;
            (&rest[..colon_pos], Some(port))
        } else {
            (rest, None)
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(Address {
            host: host.to_string(),
            port,
            user: user_part.filter(|u| !u.is_empty()).map(|u| u.to_string()),
        })
    }
}

impl TargetConfig {
    /// Parse the `host` field, if present and non-blank.
    pub fn address(&self) -> Option<Result<Address, String>> {
        self.host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .map(Address::parse)
    }
}
