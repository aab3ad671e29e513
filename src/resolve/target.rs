// ABOUTME: Deployment target composition from config and secret store.
// ABOUTME: Applies address shorthand, defaults, and the known-hosts policy.

use super::error::{ResolutionError, ResolutionErrorKind};
use crate::config::{Config, KnownHostsPolicy, TargetConfig};
use crate::secrets::{Credential, SecretRef, SecretStore};
use crate::types::TargetId;
use std::path::PathBuf;

const DEFAULT_SSH_PORT: u16 = 22;

/// Everything needed to reach and update one host for one run.
#[derive(Debug)]
pub struct DeploymentTarget {
    pub id: TargetId,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub secret_ref: SecretRef,
    pub credential: Credential,
    pub remote_path: String,
    pub restart_command: String,
    pub known_hosts: KnownHostsPolicy,
    pub known_hosts_file: Option<PathBuf>,
}

impl DeploymentTarget {
    /// `user@host:port`, for progress output.
    pub fn address(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Resolve `target_id` against the config, fetching its credential.
pub fn resolve(
    target_id: &TargetId,
    config: &Config,
    secrets: &dyn SecretStore,
) -> Result<DeploymentTarget, ResolutionError> {
    let entry = config.target(target_id).ok_or_else(|| {
        ResolutionError::new(
            target_id,
            ResolutionErrorKind::UnknownTarget,
            "not defined in config",
        )
    })?;

    let address = entry
        .address()
        .ok_or_else(|| ResolutionError::missing(target_id, "host"))?
        .map_err(|e| ResolutionError::new(target_id, ResolutionErrorKind::InvalidField, e))?;

    let user = non_blank(entry.user.as_deref())
        .or(address.user.as_deref())
        .ok_or_else(|| ResolutionError::missing(target_id, "user"))?
        .to_string();

    let secret_ref = entry
        .secret
        .clone()
        .ok_or_else(|| ResolutionError::missing(target_id, "secret"))?;

    let remote_path = required(target_id, entry, "remote_path", |t| t.remote_path.as_deref())?;
    let restart_command = required(target_id, entry, "restart", |t| t.restart.as_deref())?;

    let credential = secrets.get_secret(&secret_ref).map_err(|e| {
        ResolutionError::new(
            target_id,
            ResolutionErrorKind::SecretUnavailable,
            e.to_string(),
        )
    })?;

    let known_hosts = entry.known_hosts.unwrap_or(config.defaults.known_hosts);
    if known_hosts.is_insecure() {
        tracing::warn!(
            "Target {} uses known_hosts policy insecure-skip; host identity will not be verified",
            target_id
        );
    }

    tracing::debug!(
        "Resolved target {} to {}@{}:{}",
        target_id,
        user,
        address.host,
        entry.port.or(address.port).unwrap_or(DEFAULT_SSH_PORT)
    );

    Ok(DeploymentTarget {
        id: target_id.clone(),
        port: entry.port.or(address.port).unwrap_or(DEFAULT_SSH_PORT),
        host: address.host,
        user,
        secret_ref,
        credential,
        remote_path,
        restart_command,
        known_hosts,
        known_hosts_file: entry
            .known_hosts_file
            .as_ref()
            .map(|p| config.resolve_path(p)),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(
    target_id: &TargetId,
    entry: &TargetConfig,
    field: &str,
    get: impl Fn(&TargetConfig) -> Option<&str>,
) -> Result<String, ResolutionError> {
    non_blank(get(entry))
        .map(|v| v.to_string())
        .ok_or_else(|| ResolutionError::missing(target_id, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecretStore;

    fn config(target_yaml: &str) -> Config {
        let yaml = format!(
            r#"
build:
  commands: ["true"]
  artifact: dist
targets:
  prod:
{target_yaml}
"#
        );
        Config::from_yaml(&yaml).unwrap()
    }

    fn store() -> MemorySecretStore {
        MemorySecretStore::new().with_secret(&"env:KEY".parse().unwrap(), "pem")
    }

    fn prod() -> TargetId {
        TargetId::new("prod").unwrap()
    }

    #[test]
    fn resolves_complete_target() {
        let config = config(
            r#"    host: 10.0.1.5
    user: ubuntu
    secret: env:KEY
    remote_path: /var/www/html
    restart: systemctl restart apache2"#,
        );

        let target = resolve(&prod(), &config, &store()).unwrap();
        assert_eq!(target.host, "10.0.1.5");
        assert_eq!(target.port, 22);
        assert_eq!(target.user, "ubuntu");
        assert_eq!(target.remote_path, "/var/www/html");
        assert_eq!(target.restart_command, "systemctl restart apache2");
        assert_eq!(target.known_hosts, KnownHostsPolicy::AcceptNew);
    }

    #[test]
    fn address_shorthand_supplies_user_and_port() {
        let config = config(
            r#"    host: deploy@example.com:2222
    secret: env:KEY
    remote_path: /srv/app
    restart: "true""#,
        );

        let target = resolve(&prod(), &config, &store()).unwrap();
        assert_eq!(target.user, "deploy");
        assert_eq!(target.port, 2222);
        assert_eq!(target.address(), "deploy@example.com:2222");
    }

    #[test]
    fn missing_user_is_missing_field() {
        let config = config(
            r#"    host: example.com
    secret: env:KEY
    remote_path: /srv/app
    restart: "true""#,
        );

        let err = resolve(&prod(), &config, &store()).unwrap_err();
        assert_eq!(err.kind, ResolutionErrorKind::MissingField);
        assert_eq!(err.detail, "user");
    }

    #[test]
    fn unconfigured_secret_is_missing_field_not_unavailable() {
        let config = config(
            r#"    host: example.com
    user: ubuntu
    remote_path: /srv/app
    restart: "true""#,
        );

        let err = resolve(&prod(), &config, &store()).unwrap_err();
        assert_eq!(err.kind, ResolutionErrorKind::MissingField);
        assert_eq!(err.detail, "secret");
    }

    #[test]
    fn store_miss_is_secret_unavailable() {
        let config = config(
            r#"    host: example.com
    user: ubuntu
    secret: env:OTHER
    remote_path: /srv/app
    restart: "true""#,
        );

        let err = resolve(&prod(), &config, &store()).unwrap_err();
        assert_eq!(err.kind, ResolutionErrorKind::SecretUnavailable);
    }

    #[test]
    fn unknown_target() {
        let config = config(
            r#"    host: example.com
    user: ubuntu"#,
        );
        let err = resolve(&TargetId::new("staging").unwrap(), &config, &store()).unwrap_err();
        assert_eq!(err.kind, ResolutionErrorKind::UnknownTarget);
    }
}
