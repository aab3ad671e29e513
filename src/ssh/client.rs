// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, host key policy, key authentication, command execution, and uploads.

use super::error::{Error, Result};
use crate::config::KnownHostsPolicy;
use crate::secrets::Credential;
use parking_lot::Mutex;
use russh::client::{self, Config, Handle};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, decode_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// How unknown or changed host keys are handled.
    pub known_hosts: KnownHostsPolicy,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Timeout for command execution (default: 5 minutes).
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            known_hosts: KnownHostsPolicy::Strict,
            known_hosts_path: None,
            command_timeout: Duration::from_secs(300), // 5 minutes
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn known_hosts(mut self, policy: KnownHostsPolicy) -> Self {
        self.known_hosts = policy;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    policy: KnownHostsPolicy,
    known_hosts_path: Option<PathBuf>,
    /// Why the server key was refused, read back after a failed handshake.
    rejection: Arc<Mutex<Option<String>>>,
}

impl SshHandler {
    fn check(&self, key: &ssh_key::PublicKey) -> std::result::Result<bool, russh::keys::Error> {
        match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, key, path),
            None => check_known_hosts(&self.host, self.port, key),
        }
    }

    fn learn(&self, key: &ssh_key::PublicKey) {
        let learn_result = match &self.known_hosts_path {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learn_result {
            tracing::warn!("Failed to save host key to known_hosts: {}", e);
        }
    }

    fn reject(&self, reason: String) -> bool {
        tracing::error!("Rejecting host key for {}:{}: {}", self.host, self.port, reason);
        *self.rejection.lock() = Some(reason);
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        if self.policy.is_insecure() {
            tracing::warn!(
                "known_hosts policy insecure-skip: accepting host key for {}:{} without verification",
                self.host,
                self.port
            );
            return Ok(true);
        }

        let accepted = match self.check(server_public_key) {
            Ok(true) => true,
            Ok(false) => match self.policy {
                KnownHostsPolicy::AcceptNew => {
                    tracing::warn!(
                        "accept-new: learning unknown host key for {}:{}",
                        self.host,
                        self.port
                    );
                    self.learn(server_public_key);
                    true
                }
                _ => self.reject("host is not in known_hosts".to_string()),
            },
            Err(russh::keys::Error::KeyChanged { line }) => {
                self.reject(format!("host key changed (known_hosts line {})", line))
            }
            Err(e) => match self.policy {
                // Unreadable known_hosts: treat the host as unknown
                KnownHostsPolicy::AcceptNew => {
                    tracing::warn!("known_hosts check failed ({}), treating host as new", e);
                    self.learn(server_public_key);
                    true
                }
                _ => self.reject(format!("known_hosts check failed: {}", e)),
            },
        };

        Ok(accepted)
    }
}

/// Quote a string for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// An established SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect to the remote host and authenticate with `credential`.
    ///
    /// The key is decoded in memory; nothing is written to disk.
    pub async fn connect(config: SessionConfig, credential: &Credential) -> Result<Self> {
        let key = credential.use_secret(|bytes| {
            let pem = std::str::from_utf8(bytes)
                .map_err(|_| Error::InvalidKey("key material is not valid UTF-8".to_string()))?;
            decode_secret_key(pem, None).map_err(|e| Error::InvalidKey(e.to_string()))
        })?;

        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let rejection = Arc::new(Mutex::new(None));
        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            policy: config.known_hosts,
            known_hosts_path: config.known_hosts_path.clone(),
            rejection: Arc::clone(&rejection),
        };

        let mut handle = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        )
        .await
        .map_err(|e| {
            if let Some(reason) = rejection.lock().take() {
                Error::HostKeyRejected(reason)
            } else if e.to_string().contains("Connection refused") {
                Error::Connection(format!(
                    "connection refused to {}:{}",
                    config.host, config.port
                ))
            } else {
                Error::Connection(e.to_string())
            }
        })?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(Error::Protocol)?
            .flatten();

        let result = handle
            .authenticate_publickey(
                &config.user,
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(Error::Protocol)?;

        if !result.success() {
            return Err(Error::AuthenticationFailed);
        }

        Ok(Self { config, handle })
    }

    /// Execute a command on the remote host, bounded by the command timeout.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let timeout = self.config.command_timeout;
        match tokio::time::timeout(timeout, self.run_channel(command, None)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    /// Extract a tar archive into `remote_dir`, creating it if needed.
    ///
    /// Files are written in place; a reader on the host may observe a
    /// partially extracted tree while this runs.
    pub async fn upload_tar(&self, remote_dir: &str, archive: &[u8]) -> Result<CommandOutput> {
        let dir = shell_quote(remote_dir);
        let command = format!("mkdir -p {dir} && tar -xf - -C {dir}");
        let timeout = self.config.command_timeout;
        match tokio::time::timeout(timeout, self.run_channel(&command, Some(archive))).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    async fn run_channel(&self, command: &str, stdin: Option<&[u8]>) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        if let Some(input) = stdin {
            channel
                .data(input)
                .await
                .map_err(|e| Error::CommandFailed(format!("failed to send data: {}", e)))?;
            channel
                .eof()
                .await
                .map_err(|e| Error::CommandFailed(format!("failed to send eof: {}", e)))?;
        }

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = 0u32;

        let mut got_exit_status = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        // stderr
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status;
                    got_exit_status = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit_status {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        // No exit status means the connection dropped mid-command
        if !got_exit_status {
            return Err(Error::ChannelClosed);
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }

    /// Disconnect the session.
    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}
