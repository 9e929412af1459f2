//! Server host key verification.

use std::io::Write;
use std::path::{Path, PathBuf};

use russh::client;
use russh::keys::{HashAlg, PublicKey};

use crate::auth::HostKeyVerification;
use crate::config::ClientConfig;
use crate::config::env::home_dir;

/// Client handler for russh that verifies the server's host key.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    /// Host key verification policy.
    verification: HostKeyVerification,
    /// The host being dialed.
    host: String,
    /// The port being dialed.
    port: u16,
    /// The `known_hosts` file consulted and, under TOFU, appended to.
    known_hosts: PathBuf,
}

impl ClientHandler {
    /// Create a handler for `host:port` under `config`'s policy.
    #[must_use]
    pub fn new(host: &str, port: u16, config: &ClientConfig) -> Self {
        Self {
            verification: config.host_key_verification,
            host: host.to_string(),
            port,
            known_hosts: config
                .known_hosts_path
                .clone()
                .unwrap_or_else(default_known_hosts_path),
        }
    }

    /// The `known_hosts` host pattern: `host` on port 22, else `[host]:port`.
    fn host_pattern(&self) -> String {
        if self.port == 22 {
            self.host.clone()
        } else {
            format!("[{}]:{}", self.host, self.port)
        }
    }

    fn verify(&self, server_key: &PublicKey) -> bool {
        match self.verification {
            #[cfg(feature = "insecure-skip-verify")]
            HostKeyVerification::AcceptAll => {
                tracing::warn!(host = %self.host, "Accepting server key without verification (INSECURE)");
                true
            }
            HostKeyVerification::RejectUnknown => match self.lookup(server_key) {
                KnownHost::Match => true,
                _ => {
                    tracing::debug!(host = %self.host, "Rejecting unknown host key");
                    false
                }
            },
            HostKeyVerification::KnownHosts => match self.lookup(server_key) {
                KnownHost::Match => true,
                KnownHost::Mismatch => false,
                KnownHost::Unknown => {
                    tracing::warn!(host = %self.host, "Host not found in known_hosts file");
                    false
                }
            },
            HostKeyVerification::Tofu => match self.lookup(server_key) {
                KnownHost::Match => true,
                KnownHost::Mismatch => false,
                KnownHost::Unknown => {
                    self.remember(server_key);
                    true
                }
            },
        }
    }

    fn lookup(&self, server_key: &PublicKey) -> KnownHost {
        let contents = match std::fs::read_to_string(&self.known_hosts) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(
                    path = %self.known_hosts.display(),
                    error = %e,
                    "known_hosts file not readable"
                );
                return KnownHost::Unknown;
            }
        };

        let result = match_known_hosts(&contents, &self.host, &self.host_pattern(), server_key);
        match result {
            KnownHost::Match => {
                tracing::debug!(host = %self.host, "Host key verified against known_hosts");
            }
            KnownHost::Mismatch => {
                tracing::error!(
                    host = %self.host,
                    "HOST KEY MISMATCH! Possible man-in-the-middle attack!"
                );
            }
            KnownHost::Unknown => {}
        }
        result
    }

    /// Append the key to `known_hosts`. Failures are logged; the key is
    /// still accepted for this connection.
    fn remember(&self, server_key: &PublicKey) {
        if let Err(e) = append_known_host(&self.known_hosts, &self.host_pattern(), server_key) {
            tracing::warn!(
                error = %e,
                path = %self.known_hosts.display(),
                "Failed to record host key, accepting without saving"
            );
            return;
        }
        tracing::info!(
            host = %self.host,
            path = %self.known_hosts.display(),
            "Added host key to known_hosts (TOFU)"
        );
    }
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(self.verify(server_public_key))
    }
}

/// Outcome of a `known_hosts` lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownHost {
    Match,
    Mismatch,
    Unknown,
}

/// Find `host` in `known_hosts` text and compare its key.
///
/// Hashed entries (`|1|...`) and markers (`@cert-authority`, `@revoked`)
/// are skipped.
fn match_known_hosts(contents: &str, host: &str, pattern: &str, server_key: &PublicKey) -> KnownHost {
    let mut seen_host = false;

    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with('@') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(hostnames), Some(_key_type), Some(key_data)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };

        let host_matches = hostnames
            .split(',')
            .map(str::trim)
            .any(|h| h == pattern || (pattern == host && h == host));
        if !host_matches {
            continue;
        }
        seen_host = true;

        let Ok(stored) = russh::keys::parse_public_key_base64(key_data) else {
            continue;
        };
        if stored.fingerprint(HashAlg::Sha256) == server_key.fingerprint(HashAlg::Sha256) {
            return KnownHost::Match;
        }
    }

    if seen_host {
        KnownHost::Mismatch
    } else {
        KnownHost::Unknown
    }
}

fn append_known_host(path: &Path, pattern: &str, key: &PublicKey) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
            }
        }
    }

    let encoded = key
        .to_openssh()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    // Drop the comment; known_hosts lines are "pattern type base64".
    let entry: Vec<&str> = encoded.split_whitespace().take(2).collect();

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{pattern} {}", entry.join(" "))
}

/// `$SSH_KNOWN_HOSTS`, else `~/.ssh/known_hosts`.
fn default_known_hosts_path() -> PathBuf {
    if let Some(path) = std::env::var_os("SSH_KNOWN_HOSTS") {
        return PathBuf::from(path);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ssh")
        .join("known_hosts")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ED25519: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIJdD7y3aLq454yWBdwLWbieU1ebz9/cu7/QEXn9OIeZJ";
    const OTHER_ED25519: &str =
        "AAAAC3NzaC1lZDI1NTE5AAAAIA6rWI3G1sz07DnfFlrouTcysQlj2P+jpNSOEWD9OJ3X";

    fn key(data: &str) -> PublicKey {
        russh::keys::parse_public_key_base64(data).unwrap()
    }

    #[test]
    fn matching_entry_is_accepted() {
        let contents = format!("# comment\nbuild-01,10.0.0.5 ssh-ed25519 {ED25519}\n");
        assert_eq!(
            match_known_hosts(&contents, "build-01", "build-01", &key(ED25519)),
            KnownHost::Match
        );
        assert_eq!(
            match_known_hosts(&contents, "10.0.0.5", "10.0.0.5", &key(ED25519)),
            KnownHost::Match
        );
    }

    #[test]
    fn different_key_is_a_mismatch() {
        let contents = format!("build-01 ssh-ed25519 {ED25519}\n");
        assert_eq!(
            match_known_hosts(&contents, "build-01", "build-01", &key(OTHER_ED25519)),
            KnownHost::Mismatch
        );
    }

    #[test]
    fn non_standard_port_uses_bracket_pattern() {
        let contents = format!("[build-01]:2222 ssh-ed25519 {ED25519}\n");
        assert_eq!(
            match_known_hosts(&contents, "build-01", "[build-01]:2222", &key(ED25519)),
            KnownHost::Match
        );
        assert_eq!(
            match_known_hosts(&contents, "build-01", "build-01", &key(ED25519)),
            KnownHost::Unknown
        );
    }

    #[test]
    fn tofu_records_then_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssh").join("known_hosts");
        let config = ClientConfig::new("u")
            .host_key_verification(HostKeyVerification::Tofu)
            .known_hosts(&path);

        let handler = ClientHandler::new("build-01", 2222, &config);
        assert!(handler.verify(&key(ED25519)));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("[build-01]:2222 ssh-ed25519 "));

        assert!(handler.verify(&key(ED25519)));
        assert!(!handler.verify(&key(OTHER_ED25519)));
    }

    #[test]
    fn known_hosts_policy_rejects_unknown_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::new("u").known_hosts(dir.path().join("absent"));
        let handler = ClientHandler::new("build-01", 22, &config);
        assert!(!handler.verify(&key(ED25519)));
    }
}
