//! Connection establishment.
//!
//! Credential methods are tried one per dial, in order. The loop stops at
//! the first success or at the first error that is not an authentication
//! rejection; if every method is rejected, the last rejection is returned.

use crate::backend::ssh::{RusshConnection, RusshDialer};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::{Attempt, Dialer};

/// Connect to `address` with the production SSH transport.
///
/// # Example
///
/// ```ignore
/// let config = ClientConfig::new("deploy")
///     .with_password("hunter2")
///     .with_password_prompt(|| read_password_somehow());
/// let connection = skiff::connect("build-01:22", &config).await?;
/// ```
///
/// # Errors
///
/// Returns [`Error::Config`] for an empty method list, the final
/// [`Error::AuthRejected`] if every method is rejected, or the first
/// transport error.
pub async fn connect(address: &str, config: &ClientConfig) -> Result<RusshConnection> {
    connect_with(&RusshDialer, address, config).await
}

/// Connect to `address` through `dialer`.
///
/// # Errors
///
/// As for [`connect`].
pub async fn connect_with<D: Dialer>(
    dialer: &D,
    address: &str,
    config: &ClientConfig,
) -> Result<D::Connection> {
    if config.auth_methods().is_empty() {
        return Err(Error::config("at least one authentication method is required"));
    }

    let mut last_rejection = None;
    for (index, method) in config.auth_methods().iter().enumerate() {
        let attempt = Attempt::new(address, config, method, index);
        tracing::debug!(
            address,
            user = %config.username(),
            method = method.name(),
            attempt = index + 1,
            "Attempting connection"
        );

        match dialer.dial(&attempt).await {
            Ok(connection) => {
                tracing::info!(
                    address,
                    user = %config.username(),
                    method = method.name(),
                    "Connected"
                );
                return Ok(connection);
            }
            Err(e) if e.is_auth_rejection() => {
                tracing::debug!(error = %e, "Credential rejected, trying next method");
                last_rejection = Some(e);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Connection failed");
                return Err(e);
            }
        }
    }

    Err(last_rejection
        .unwrap_or_else(|| Error::config("at least one authentication method is required")))
}

/// Split `address` into host and port, using `default_port` when absent.
///
/// Accepts `host`, `host:port`, `[v6]` and `[v6]:port`. A bare IPv6
/// address without brackets is taken as a host.
///
/// # Errors
///
/// Returns a configuration error for an empty host or a bad port.
pub fn parse_address(address: &str, default_port: u16) -> Result<(String, u16)> {
    let invalid = || Error::config(format!("invalid address '{address}'"));

    if address.is_empty() {
        return Err(invalid());
    }

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail {
            "" => default_port,
            _ => tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)?,
        };
        return Ok((host.to_string(), port));
    }

    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port = port.parse().map_err(|_| invalid())?;
            if host.is_empty() {
                return Err(invalid());
            }
            Ok((host.to_string(), port))
        }
        _ => Ok((address.to_string(), default_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{DialOutcome, FakeDialer};

    fn config_with(methods: usize) -> ClientConfig {
        (0..methods).fold(ClientConfig::new("deploy"), |config, i| {
            config.with_password(format!("pw{i}"))
        })
    }

    #[tokio::test]
    async fn empty_method_list_never_dials() {
        let dialer = FakeDialer::new([]);
        let err = connect_with(&dialer, "host:22", &ClientConfig::new("deploy"))
            .await
            .err()
            .unwrap();
        assert!(err.is_config());
        assert_eq!(dialer.attempts(), 0);
    }

    #[tokio::test]
    async fn stops_at_first_accepted_method() {
        let dialer = FakeDialer::new([
            DialOutcome::Reject,
            DialOutcome::Reject,
            DialOutcome::Accept,
            DialOutcome::Accept,
        ]);
        let result = connect_with(&dialer, "host:22", &config_with(4)).await;
        assert!(result.is_ok());
        assert_eq!(dialer.attempts(), 3);
    }

    #[tokio::test]
    async fn attempts_use_one_method_each() {
        let dialer = FakeDialer::new([DialOutcome::Reject, DialOutcome::Accept]);
        let config = ClientConfig::new("deploy")
            .with_password("wrong")
            .with_password_prompt(|| Ok("right".into()));
        connect_with(&dialer, "host:22", &config).await.unwrap();
        assert_eq!(dialer.methods(), ["password", "password-prompt"]);
    }

    #[tokio::test]
    async fn all_rejected_returns_last_rejection() {
        let dialer = FakeDialer::new([DialOutcome::Reject, DialOutcome::Reject]);
        let err = connect_with(&dialer, "host:22", &config_with(2))
            .await
            .err()
            .unwrap();
        assert!(err.is_auth_rejection());
        assert!(err.to_string().contains("attempt 2"));
        assert_eq!(dialer.attempts(), 2);
    }

    #[tokio::test]
    async fn transport_error_aborts_the_loop() {
        let dialer = FakeDialer::new([
            DialOutcome::Reject,
            DialOutcome::Unreachable,
            DialOutcome::Accept,
        ]);
        let err = connect_with(&dialer, "host:22", &config_with(3))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(dialer.attempts(), 2);
    }

    #[test]
    fn address_parsing() {
        assert_eq!(parse_address("example.com", 22).unwrap(), ("example.com".into(), 22));
        assert_eq!(
            parse_address("example.com:2222", 22).unwrap(),
            ("example.com".into(), 2222)
        );
        assert_eq!(parse_address("[::1]:2200", 22).unwrap(), ("::1".into(), 2200));
        assert_eq!(parse_address("[::1]", 22).unwrap(), ("::1".into(), 22));
        assert_eq!(parse_address("fe80::1", 22).unwrap(), ("fe80::1".into(), 22));

        assert!(parse_address("", 22).unwrap_err().is_config());
        assert!(parse_address("host:ssh", 22).unwrap_err().is_config());
        assert!(parse_address(":22", 22).unwrap_err().is_config());
        assert!(parse_address("[::1", 22).unwrap_err().is_config());
    }
}
