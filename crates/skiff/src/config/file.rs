//! File-based configuration loading.
//!
//! A TOML file with a single `[client]` table:
//!
//! ```toml
//! [client]
//! user = "deploy"
//! port = 2222
//! connect-timeout-secs = 10
//! host-key-verification = "tofu"
//! agent = true
//! identity-files = ["~/.ssh/id_ed25519"]
//! ```
//!
//! Passwords are deliberately not representable here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::ClientConfig;
use super::env::home_dir;
use crate::auth::AuthMethod;
use crate::error::{Error, Result};

/// Parsed configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// The `[client]` table.
    #[serde(default)]
    pub client: ClientSection,
}

/// Connection defaults from the `[client]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ClientSection {
    /// Login user.
    pub user: Option<String>,
    /// Port used when an address carries none.
    pub port: Option<u16>,
    /// Dial timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Idle timeout in seconds.
    pub inactivity_timeout_secs: Option<u64>,
    /// Keepalive interval in seconds.
    pub keepalive_secs: Option<u64>,
    /// Host key policy name.
    pub host_key_verification: Option<String>,
    /// Path of the `known_hosts` file.
    pub known_hosts: Option<PathBuf>,
    /// Whether to try the SSH agent.
    pub agent: bool,
    /// Private keys to try, in order, after the agent.
    pub identity_files: Vec<PathBuf>,
}

impl ConfigFile {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid TOML or unknown keys.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("invalid config file: {e}")))
    }

    /// Load and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io_context(format!("reading {}", path.display()), e))?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Self::parse(&content)
    }

    /// The default location, `$XDG_CONFIG_HOME/skiff/config.toml` or
    /// `~/.config/skiff/config.toml`, if the file exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|h| h.join(".config")))?;
        let path = base.join("skiff").join("config.toml");
        path.is_file().then_some(path)
    }

    /// Layer this file over `config`.
    ///
    /// Scalar settings replace the existing values; credential methods are
    /// appended after any already configured.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown host key policy.
    pub fn apply(&self, mut config: ClientConfig) -> Result<ClientConfig> {
        let section = &self.client;

        if let Some(user) = &section.user {
            config.credentials.username.clone_from(user);
        }
        if let Some(port) = section.port {
            config.port = port;
        }
        if let Some(secs) = section.connect_timeout_secs {
            config.connect_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = section.inactivity_timeout_secs {
            config.inactivity_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = section.keepalive_secs {
            config.keepalive_interval = Some(Duration::from_secs(secs));
        }
        if let Some(policy) = &section.host_key_verification {
            config.host_key_verification = policy.parse()?;
        }
        if let Some(path) = &section.known_hosts {
            config.known_hosts_path = Some(expand_home(path));
        }
        if section.agent {
            config.credentials.auth_methods.push(AuthMethod::Agent);
        }
        for key in &section.identity_files {
            config
                .credentials
                .auth_methods
                .push(AuthMethod::public_key(expand_home(key)));
        }

        Ok(config)
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
