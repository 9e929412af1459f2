//! Configuration types for skiff.
//!
//! [`ClientConfig`] is the single base configuration a connection is
//! established from. It can be built in code, layered from a TOML file
//! ([`file::ConfigFile`]) and overridden from `SKIFF_*` environment
//! variables ([`env::EnvConfig`]).

pub mod env;
pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{AuthMethod, Credentials, HostKeyVerification};
use crate::error::Result;

use self::env::vars;

pub use env::EnvConfig;
pub use file::ConfigFile;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Base configuration for establishing a connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Username and ordered credential methods.
    pub credentials: Credentials,
    /// Port used when the address carries none.
    pub port: u16,
    /// Dial timeout; `None` waits for the OS.
    pub connect_timeout: Option<Duration>,
    /// Host key verification policy.
    pub host_key_verification: HostKeyVerification,
    /// Explicit `known_hosts` path; defaults to `$SSH_KNOWN_HOSTS` or
    /// `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,
    /// Idle timeout for the transport.
    pub inactivity_timeout: Option<Duration>,
    /// Interval between transport keepalives.
    pub keepalive_interval: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_credentials(Credentials::default())
    }
}

impl ClientConfig {
    /// Create a configuration for `username` with no methods yet.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self::with_credentials(Credentials::new(username))
    }

    /// Create a configuration from existing credentials.
    #[must_use]
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials,
            port: DEFAULT_PORT,
            connect_timeout: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            inactivity_timeout: None,
            keepalive_interval: None,
        }
    }

    /// The login user.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// Credential methods in trial order.
    #[must_use]
    pub fn auth_methods(&self) -> &[AuthMethod] {
        &self.credentials.auth_methods
    }

    /// Append a credential method.
    #[must_use]
    pub fn with_auth(mut self, method: AuthMethod) -> Self {
        self.credentials = self.credentials.with_auth(method);
        self
    }

    /// Append password authentication.
    #[must_use]
    pub fn with_password(self, password: impl Into<String>) -> Self {
        self.with_auth(AuthMethod::password(password))
    }

    /// Append callback-prompted password authentication.
    #[must_use]
    pub fn with_password_prompt<F>(self, prompt: F) -> Self
    where
        F: Fn() -> std::io::Result<String> + Send + Sync + 'static,
    {
        self.with_auth(AuthMethod::password_prompt(prompt))
    }

    /// Append public key authentication.
    #[must_use]
    pub fn with_key(self, private_key: impl Into<PathBuf>) -> Self {
        self.with_auth(AuthMethod::public_key(private_key))
    }

    /// Append agent authentication.
    #[must_use]
    pub fn with_agent(self) -> Self {
        self.with_auth(AuthMethod::Agent)
    }

    /// Set the default port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the dial timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the host key verification policy.
    #[must_use]
    pub const fn host_key_verification(mut self, policy: HostKeyVerification) -> Self {
        self.host_key_verification = policy;
        self
    }

    /// Use a specific `known_hosts` file.
    #[must_use]
    pub fn known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Set the transport idle timeout.
    #[must_use]
    pub const fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = Some(timeout);
        self
    }

    /// Set the keepalive interval.
    #[must_use]
    pub const fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Default configuration with `SKIFF_*` overrides applied.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a variable that does not parse.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(&EnvConfig::default())
    }

    /// Apply overrides from `env`.
    ///
    /// `KEY` and `AGENT` append credential methods; the other variables
    /// replace the corresponding settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a variable that does not parse.
    pub fn with_env(mut self, env: &EnvConfig) -> Result<Self> {
        if let Some(user) = env.get(vars::USER) {
            self.credentials.username = user;
        }
        if let Some(port) = env.parse::<u16>(vars::PORT)? {
            self.port = port;
        }
        if let Some(timeout) = env.duration_secs(vars::CONNECT_TIMEOUT)? {
            self.connect_timeout = Some(timeout);
        }
        if let Some(interval) = env.duration_secs(vars::KEEPALIVE)? {
            self.keepalive_interval = Some(interval);
        }
        if let Some(policy) = env.get(vars::HOST_KEY_POLICY) {
            self.host_key_verification = policy.parse()?;
        }
        if let Some(path) = env.get(vars::KNOWN_HOSTS) {
            self.known_hosts_path = Some(PathBuf::from(path));
        }
        if env.bool(vars::AGENT) == Some(true) {
            self = self.with_agent();
        }
        if let Some(key) = env.get(vars::KEY) {
            self = self.with_key(key);
        }

        Ok(self)
    }
}
