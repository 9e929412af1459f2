//! Environment-based configuration.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "SKIFF";

/// Environment variable reader.
///
/// Values set with [`with_var`](Self::with_var) shadow the process
/// environment, which keeps lookups testable without mutating global state.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Values that take precedence over the process environment.
    overrides: HashMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a new environment config reader.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: HashMap::new(),
        }
    }

    /// Create without a prefix.
    #[must_use]
    pub fn no_prefix() -> Self {
        Self::new(String::new())
    }

    /// Shadow a variable (given without prefix).
    #[must_use]
    pub fn with_var(mut self, name: &str, value: impl Into<String>) -> Self {
        let var_name = self.var_name(name);
        self.overrides.insert(var_name, value.into());
        self
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        self.overrides
            .get(&var_name)
            .cloned()
            .or_else(|| std::env::var(&var_name).ok())
    }

    /// Get a string value with default.
    #[must_use]
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Get a parsed value.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the variable if it is set but
    /// does not parse.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.trim().parse().map_err(|e| {
                    Error::config(format!("invalid value for {}: {e}", self.var_name(name)))
                })
            })
            .transpose()
    }

    /// Get a boolean value.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| {
            matches!(
                v.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on" | "enabled"
            )
        })
    }

    /// Get a duration in seconds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value is not a whole number.
    pub fn duration_secs(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_secs))
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Variable names read by [`ClientConfig::with_env`](crate::ClientConfig::with_env).
pub mod vars {
    /// Login user.
    pub const USER: &str = "USER";
    /// Default port.
    pub const PORT: &str = "PORT";
    /// Dial timeout in seconds.
    pub const CONNECT_TIMEOUT: &str = "CONNECT_TIMEOUT";
    /// Private key appended as a publickey method.
    pub const KEY: &str = "KEY";
    /// Whether to append an agent method.
    pub const AGENT: &str = "AGENT";
    /// Host key policy name.
    pub const HOST_KEY_POLICY: &str = "HOST_KEY_POLICY";
    /// Path of the `known_hosts` file.
    pub const KNOWN_HOSTS: &str = "KNOWN_HOSTS";
    /// Keepalive interval in seconds.
    pub const KEEPALIVE: &str = "KEEPALIVE";
}

/// Get the home directory.
#[must_use]
pub fn home_dir() -> Option<std::path::PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .map(std::path::PathBuf::from)
}
