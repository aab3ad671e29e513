// ABOUTME: Global retry, backoff, and timeout defaults.
// ABOUTME: Applied to every target unless overridden on the command line.

use super::KnownHostsPolicy;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Defaults {
    /// Maximum number of copy attempts per run.
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Upper bound for each transport operation.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// How long a run waits for another run on the same target.
    #[serde(default = "default_lock_timeout", with = "humantime_serde")]
    pub lock_timeout: Duration,

    #[serde(default)]
    pub known_hosts: KnownHostsPolicy,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            backoff: BackoffConfig::default(),
            timeout: default_timeout(),
            lock_timeout: default_lock_timeout(),
            known_hosts: KnownHostsPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_base", with = "humantime_serde")]
    pub base: Duration,

    #[serde(default = "default_factor")]
    pub factor: u32,

    #[serde(default = "default_cap", with = "humantime_serde")]
    pub cap: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            factor: default_factor(),
            cap: default_cap(),
        }
    }
}

fn default_retries() -> u32 {
    3
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_base() -> Duration {
    Duration::from_secs(1)
}

fn default_factor() -> u32 {
    2
}

fn default_cap() -> Duration {
    Duration::from_secs(30)
}
