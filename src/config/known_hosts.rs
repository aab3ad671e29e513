// ABOUTME: Host key verification policy for SSH sessions.
// ABOUTME: Supports strict, accept-new, and insecure-skip.

use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KnownHostsPolicy {
    /// Host must already be present in known_hosts.
    Strict,
    /// Unknown hosts are learned on first contact; changed keys are rejected.
    #[default]
    AcceptNew,
    /// Any host key is accepted. Development only.
    InsecureSkip,
}

impl KnownHostsPolicy {
    pub fn is_insecure(&self) -> bool {
        matches!(self, KnownHostsPolicy::InsecureSkip)
    }
}

impl FromStr for KnownHostsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(KnownHostsPolicy::Strict),
            "accept-new" => Ok(KnownHostsPolicy::AcceptNew),
            "insecure-skip" => Ok(KnownHostsPolicy::InsecureSkip),
            _ => Err(format!(
                "unknown known_hosts policy: {} (expected strict, accept-new or insecure-skip)",
                s
            )),
        }
    }
}

impl fmt::Display for KnownHostsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnownHostsPolicy::Strict => write!(f, "strict"),
            KnownHostsPolicy::AcceptNew => write!(f, "accept-new"),
            KnownHostsPolicy::InsecureSkip => write!(f, "insecure-skip"),
        }
    }
}

impl<'de> Deserialize<'de> for KnownHostsPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl Serialize for KnownHostsPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
