//! Credential methods and host key policy.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

type PromptFn = dyn Fn() -> io::Result<String> + Send + Sync;

/// Callback that produces a password on demand.
///
/// Prompting UI belongs to the caller; the callback is invoked once per
/// attempt, and an error from it counts as a rejection of that method.
#[derive(Clone)]
pub struct PasswordPrompt(Arc<PromptFn>);

impl PasswordPrompt {
    /// Wrap a prompt callback.
    pub fn new<F>(prompt: F) -> Self
    where
        F: Fn() -> io::Result<String> + Send + Sync + 'static,
    {
        Self(Arc::new(prompt))
    }

    /// Ask for the password.
    pub fn ask(&self) -> io::Result<String> {
        (self.0)()
    }
}

impl fmt::Debug for PasswordPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordPrompt(..)")
    }
}

/// One SSH authentication method.
///
/// Each method is tried on its own transport dial; methods are never
/// combined into one negotiation.
#[derive(Clone)]
pub enum AuthMethod {
    /// Password authentication.
    Password(String),
    /// Password authentication with the password supplied by a callback.
    PasswordPrompt(PasswordPrompt),
    /// Public key authentication.
    PublicKey {
        /// Private key path.
        private_key: PathBuf,
        /// Passphrase for the key (if encrypted).
        passphrase: Option<String>,
    },
    /// SSH agent authentication.
    Agent,
    /// Keyboard-interactive authentication with canned responses.
    KeyboardInteractive {
        /// Responses handed out to prompts in order.
        responses: Vec<String>,
    },
    /// The `none` method.
    None,
}

impl AuthMethod {
    /// Create password auth.
    #[must_use]
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password(password.into())
    }

    /// Create callback-prompted password auth.
    #[must_use]
    pub fn password_prompt<F>(prompt: F) -> Self
    where
        F: Fn() -> io::Result<String> + Send + Sync + 'static,
    {
        Self::PasswordPrompt(PasswordPrompt::new(prompt))
    }

    /// Create public key auth.
    #[must_use]
    pub fn public_key(private_key: impl Into<PathBuf>) -> Self {
        Self::PublicKey {
            private_key: private_key.into(),
            passphrase: None,
        }
    }

    /// Create public key auth with passphrase.
    #[must_use]
    pub fn public_key_with_passphrase(
        private_key: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self::PublicKey {
            private_key: private_key.into(),
            passphrase: Some(passphrase.into()),
        }
    }

    /// Create agent auth.
    #[must_use]
    pub const fn agent() -> Self {
        Self::Agent
    }

    /// Create keyboard-interactive auth.
    #[must_use]
    pub fn keyboard_interactive<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::KeyboardInteractive {
            responses: responses.into_iter().map(Into::into).collect(),
        }
    }

    /// Protocol-level name of the method.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PasswordPrompt(_) => "password-prompt",
            Self::PublicKey { .. } => "publickey",
            Self::Agent => "agent",
            Self::KeyboardInteractive { .. } => "keyboard-interactive",
            Self::None => "none",
        }
    }

    /// Check if this is password auth (direct or prompted).
    #[must_use]
    pub const fn is_password(&self) -> bool {
        matches!(self, Self::Password(_) | Self::PasswordPrompt(_))
    }

    /// Check if this is public key auth.
    #[must_use]
    pub const fn is_public_key(&self) -> bool {
        matches!(self, Self::PublicKey { .. })
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::PasswordPrompt(prompt) => f.debug_tuple("PasswordPrompt").field(prompt).finish(),
            Self::PublicKey {
                private_key,
                passphrase,
            } => f
                .debug_struct("PublicKey")
                .field("private_key", private_key)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::Agent => f.write_str("Agent"),
            Self::KeyboardInteractive { responses } => f
                .debug_struct("KeyboardInteractive")
                .field("responses", &responses.len())
                .finish(),
            Self::None => f.write_str("None"),
        }
    }
}

/// Who is authenticating and with which methods, in order.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Authentication methods to try (in order).
    pub auth_methods: Vec<AuthMethod>,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth_methods: Vec::new(),
        }
    }

    /// Add an authentication method.
    #[must_use]
    pub fn with_auth(mut self, method: AuthMethod) -> Self {
        self.auth_methods.push(method);
        self
    }

    /// Add password authentication.
    #[must_use]
    pub fn with_password(self, password: impl Into<String>) -> Self {
        self.with_auth(AuthMethod::password(password))
    }

    /// Add callback-prompted password authentication.
    #[must_use]
    pub fn with_password_prompt<F>(self, prompt: F) -> Self
    where
        F: Fn() -> io::Result<String> + Send + Sync + 'static,
    {
        self.with_auth(AuthMethod::password_prompt(prompt))
    }

    /// Add public key authentication.
    #[must_use]
    pub fn with_key(self, private_key: impl Into<PathBuf>) -> Self {
        self.with_auth(AuthMethod::public_key(private_key))
    }

    /// Add agent authentication.
    #[must_use]
    pub fn with_agent(self) -> Self {
        self.with_auth(AuthMethod::Agent)
    }

    /// Add agent authentication, then the default key files.
    #[must_use]
    pub fn with_defaults(self) -> Self {
        let home = std::env::var("HOME").unwrap_or_default();
        self.with_agent()
            .with_key(format!("{home}/.ssh/id_ed25519"))
            .with_key(format!("{home}/.ssh/id_rsa"))
    }
}

impl Default for Credentials {
    fn default() -> Self {
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "root".to_string());
        Self::new(username)
    }
}

/// Host key verification policy.
///
/// # Security
///
/// The default policy is `KnownHosts`, which checks the server's key against
/// the user's `known_hosts` file.
///
/// The `AcceptAll` variant is only available when the `insecure-skip-verify`
/// feature is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum HostKeyVerification {
    /// Accept all keys without verification.
    ///
    /// **DANGEROUS:** allows man-in-the-middle attacks. Only use this in
    /// controlled testing environments.
    #[cfg(feature = "insecure-skip-verify")]
    AcceptAll,
    /// Reject unknown keys.
    RejectUnknown,
    /// Check against `known_hosts` file.
    #[default]
    KnownHosts,
    /// Accept on first use, then verify (Trust On First Use).
    Tofu,
}

impl std::str::FromStr for HostKeyVerification {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "known-hosts" | "known_hosts" | "knownhosts" => Ok(Self::KnownHosts),
            "tofu" => Ok(Self::Tofu),
            "reject-unknown" | "reject_unknown" | "strict" => Ok(Self::RejectUnknown),
            #[cfg(feature = "insecure-skip-verify")]
            "accept-all" | "accept_all" => Ok(Self::AcceptAll),
            other => Err(crate::error::Error::config(format!(
                "unknown host key verification policy '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_method_password() {
        let auth = AuthMethod::password("secret");
        assert!(auth.is_password());
        assert!(!auth.is_public_key());
        assert_eq!(auth.name(), "password");
    }

    #[test]
    fn debug_redacts_secrets() {
        let auth = AuthMethod::password("hunter2");
        assert!(!format!("{auth:?}").contains("hunter2"));

        let auth = AuthMethod::public_key_with_passphrase("/k", "opensesame");
        let shown = format!("{auth:?}");
        assert!(shown.contains("/k"));
        assert!(!shown.contains("opensesame"));

        let auth = AuthMethod::keyboard_interactive(["123456"]);
        assert!(!format!("{auth:?}").contains("123456"));
    }

    #[test]
    fn prompt_is_invoked_per_call() {
        let auth = AuthMethod::password_prompt(|| Ok("typed".to_string()));
        let AuthMethod::PasswordPrompt(prompt) = auth else {
            panic!("expected a prompt");
        };
        assert_eq!(prompt.ask().unwrap(), "typed");
    }

    #[test]
    fn credentials_builder() {
        let creds = Credentials::new("user")
            .with_password("pass")
            .with_password_prompt(|| Ok("fallback".into()))
            .with_agent();

        assert_eq!(creds.username, "user");
        let names: Vec<_> = creds.auth_methods.iter().map(AuthMethod::name).collect();
        assert_eq!(names, ["password", "password-prompt", "agent"]);
    }

    #[test]
    fn host_key_policy_parsing() {
        assert_eq!(
            "tofu".parse::<HostKeyVerification>().unwrap(),
            HostKeyVerification::Tofu
        );
        assert_eq!(
            "known-hosts".parse::<HostKeyVerification>().unwrap(),
            HostKeyVerification::KnownHosts
        );
        assert!("yolo".parse::<HostKeyVerification>().unwrap_err().is_config());
        assert_eq!(HostKeyVerification::default(), HostKeyVerification::KnownHosts);
    }
}
