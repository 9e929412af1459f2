//! Dialing, authentication and the connection handle.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use russh::client::{self, Handle, KeyboardInteractiveAuthResponse};
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg};
use russh_sftp::client::SftpSession;

use super::channel::RusshSession;
use super::host_keys::ClientHandler;
use super::sftp::SftpFiles;
use crate::auth::AuthMethod;
use crate::connect::parse_address;
use crate::error::{Error, Phase, Result};
use crate::transport::{Attempt, Connection, Dialer};

/// Dials over TCP with `russh`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusshDialer;

impl Dialer for RusshDialer {
    type Connection = RusshConnection;

    async fn dial(&self, attempt: &Attempt<'_>) -> Result<RusshConnection> {
        let config = attempt.config;
        let (host, port) = parse_address(attempt.address, config.port)?;

        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: config.inactivity_timeout,
            keepalive_interval: config.keepalive_interval,
            ..client::Config::default()
        });
        let handler = ClientHandler::new(&host, port, config);

        tracing::debug!(host = %host, port, "Connecting to SSH server");
        let connecting = client::connect(ssh_config, (host.as_str(), port), handler);
        let connected = match config.connect_timeout {
            Some(duration) => tokio::time::timeout(duration, connecting)
                .await
                .map_err(|_| Error::Timeout {
                    address: attempt.address.to_string(),
                    duration,
                })?,
            None => connecting.await,
        };
        let mut handle = connected.map_err(|e| classify(attempt.address, e))?;

        match authenticate(&mut handle, attempt).await {
            Ok(()) => Ok(RusshConnection {
                handle,
                address: attempt.address.to_string(),
            }),
            Err(e) => {
                if let Err(close) = handle
                    .disconnect(russh::Disconnect::ByApplication, "", "en")
                    .await
                {
                    tracing::debug!(error = %close, "Disconnect after failed attempt failed");
                }
                Err(e)
            }
        }
    }
}

fn classify(address: &str, error: russh::Error) -> Error {
    match error {
        russh::Error::UnknownKey => Error::HostKey {
            address: address.to_string(),
        },
        other => Error::connection(address, other.to_string()),
    }
}

/// Run the attempt's single method against `handle`.
async fn authenticate(handle: &mut Handle<ClientHandler>, attempt: &Attempt<'_>) -> Result<()> {
    let user = attempt.username();
    let method = attempt.method;
    let rejected = |reason: String| Error::auth_rejected(user, method.name(), reason);
    let transport = |e: russh::Error| {
        Error::connection(
            attempt.address,
            format!("{} authentication failed: {e}", method.name()),
        )
    };

    tracing::debug!(user = %user, method = method.name(), "Authenticating");

    let accepted = match method {
        AuthMethod::Password(password) => handle
            .authenticate_password(user, password)
            .await
            .map_err(transport)?
            .success(),
        AuthMethod::PasswordPrompt(prompt) => {
            let password = prompt
                .ask()
                .map_err(|e| rejected(format!("password prompt failed: {e}")))?;
            handle
                .authenticate_password(user, password)
                .await
                .map_err(transport)?
                .success()
        }
        AuthMethod::PublicKey {
            private_key,
            passphrase,
        } => {
            let key = load_private_key(private_key, passphrase.as_deref())
                .await
                .map_err(|e| rejected(e.to_string()))?;
            let rsa_hash = handle
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();
            handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, rsa_hash))
                .await
                .map_err(transport)?
                .success()
        }
        AuthMethod::Agent => authenticate_agent(handle, user)
            .await
            .map_err(rejected)?,
        AuthMethod::KeyboardInteractive { responses } => {
            keyboard_interactive(handle, user, responses)
                .await
                .map_err(transport)?
        }
        AuthMethod::None => handle
            .authenticate_none(user)
            .await
            .map_err(transport)?
            .success(),
    };

    if accepted {
        tracing::info!(user = %user, method = method.name(), "Authentication successful");
        Ok(())
    } else {
        Err(rejected("server rejected the credential".to_string()))
    }
}

/// Offer every agent identity in turn.
///
/// An unreachable agent or an empty key list is a rejection of the method.
#[cfg(unix)]
async fn authenticate_agent(
    handle: &mut Handle<ClientHandler>,
    user: &str,
) -> std::result::Result<bool, String> {
    let mut agent = russh::keys::agent::client::AgentClient::connect_env()
        .await
        .map_err(|e| format!("SSH agent unavailable: {e}"))?;
    let keys = agent
        .request_identities()
        .await
        .map_err(|e| format!("failed to list agent identities: {e}"))?;
    if keys.is_empty() {
        return Err("SSH agent holds no identities".to_string());
    }
    tracing::debug!(user = %user, key_count = keys.len(), "Found keys in SSH agent");

    for key in keys {
        let rsa_hash = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        match handle
            .authenticate_publickey_with(user, key.clone(), rsa_hash, &mut agent)
            .await
        {
            Ok(result) if result.success() => return Ok(true),
            Ok(_) => {
                tracing::debug!(
                    user = %user,
                    key_type = %key.algorithm().as_str(),
                    "SSH agent key rejected, trying next"
                );
            }
            Err(e) => {
                tracing::debug!(user = %user, error = %e, "SSH agent authentication error");
            }
        }
    }
    Ok(false)
}

#[cfg(not(unix))]
async fn authenticate_agent(
    _handle: &mut Handle<ClientHandler>,
    _user: &str,
) -> std::result::Result<bool, String> {
    Err("SSH agent authentication is not supported on this platform".to_string())
}

/// Answer keyboard-interactive prompts from `responses`, in order.
///
/// Prompts beyond the supplied responses are answered with an empty string.
async fn keyboard_interactive(
    handle: &mut Handle<ClientHandler>,
    user: &str,
    responses: &[String],
) -> std::result::Result<bool, russh::Error> {
    let mut answers = responses.iter();
    let mut reply = handle
        .authenticate_keyboard_interactive_start(user, None)
        .await?;

    loop {
        match reply {
            KeyboardInteractiveAuthResponse::Success => return Ok(true),
            KeyboardInteractiveAuthResponse::Failure { .. } => return Ok(false),
            KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                tracing::debug!(
                    user = %user,
                    prompt_count = prompts.len(),
                    "Received keyboard-interactive prompts"
                );
                let round = prompts
                    .iter()
                    .map(|_| answers.next().cloned().unwrap_or_default())
                    .collect();
                reply = handle
                    .authenticate_keyboard_interactive_respond(round)
                    .await?;
            }
        }
    }
}

/// Load a private key from a file, decrypting it with `passphrase`.
pub async fn load_private_key(path: &Path, passphrase: Option<&str>) -> Result<Arc<PrivateKey>> {
    let key_str = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io_context(format!("failed to read key file {}", path.display()), e))?;

    let key = russh::keys::decode_secret_key(&key_str, passphrase).map_err(|e| {
        if passphrase.is_none() && e.to_string().contains("encrypted") {
            Error::config(format!(
                "key {} appears to be encrypted but no passphrase was provided",
                path.display()
            ))
        } else {
            Error::config(format!("failed to decode key {}: {e}", path.display()))
        }
    })?;

    Ok(Arc::new(key))
}

/// An authenticated `russh` connection.
pub struct RusshConnection {
    handle: Handle<ClientHandler>,
    address: String,
}

impl RusshConnection {
    /// The address this connection was dialed with.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Debug for RusshConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RusshConnection")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Connection for RusshConnection {
    type Session = RusshSession;
    type Files = SftpFiles;

    async fn open_session(&self) -> Result<RusshSession> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::remote(Phase::SessionOpen, e.to_string()))?;
        tracing::trace!(address = %self.address, "Session channel opened");
        Ok(RusshSession::new(channel))
    }

    async fn open_file_session(&self) -> Result<SftpFiles> {
        let sftp_open = |e: &dyn fmt::Display| Error::remote(Phase::SftpOpen, e.to_string());

        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| sftp_open(&e))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| sftp_open(&e))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| sftp_open(&e))?;
        tracing::trace!(address = %self.address, "SFTP session opened");
        Ok(SftpFiles::new(sftp))
    }

    async fn close(self) -> Result<()> {
        tracing::debug!(address = %self.address, "Disconnecting");
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| Error::connection(self.address.as_str(), e.to_string()))
    }
}
