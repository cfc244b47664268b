//! Credentials, server endpoints, and minimal input validation.

use std::fmt;

/// Default submission (SMTP) port, implicit TLS.
pub const DEFAULT_SUBMISSION_PORT: u16 = 465;

/// Default store (IMAP) port, implicit TLS.
pub const DEFAULT_STORE_PORT: u16 = 993;

/// Account credentials for one transfer.
///
/// Captured per call and discarded afterwards; never persisted. The `Debug`
/// implementation redacts the secret so credentials cannot leak into logs.
#[derive(Clone)]
pub struct Credentials {
    /// Account address (also the SMTP/IMAP username).
    pub address: String,
    /// Account secret.
    pub secret: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Transport security mode for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Encryption from connection open (implicit TLS).
    Tls,
    /// Plaintext open, explicitly upgraded mid-session.
    StartTls,
    /// No encryption; local testing only.
    None,
}

/// A network-reachable mail server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport security mode.
    pub security: Security,
}

impl ServerEndpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, security: Security) -> Self {
        Self {
            host: host.into(),
            port,
            security,
        }
    }

    /// Default submission endpoint for a host (465, implicit TLS).
    #[must_use]
    pub fn submission(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_SUBMISSION_PORT, Security::Tls)
    }

    /// Default store endpoint for a host (993, implicit TLS).
    #[must_use]
    pub fn store(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_STORE_PORT, Security::Tls)
    }
}

/// Front-end input validation errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Address must not be empty.
    #[error("address must not be empty")]
    EmptyAddress,

    /// Secret must not be empty.
    #[error("secret must not be empty")]
    EmptySecret,

    /// Recipient must not be empty.
    #[error("recipient must not be empty")]
    EmptyRecipient,
}

/// Validates captured credentials.
///
/// # Errors
///
/// Returns an error if the address or secret is empty.
pub fn validate_credentials(credentials: &Credentials) -> Result<(), ValidationError> {
    if credentials.address.trim().is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    if credentials.secret.is_empty() {
        return Err(ValidationError::EmptySecret);
    }
    Ok(())
}

/// Validates a send recipient.
///
/// # Errors
///
/// Returns an error if the recipient is empty.
pub fn validate_recipient(recipient: &str) -> Result<(), ValidationError> {
    if recipient.trim().is_empty() {
        return Err(ValidationError::EmptyRecipient);
    }
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials::new("user@example.com", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("user@example.com"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_default_endpoints() {
        let submission = ServerEndpoint::submission("mail.example.com");
        assert_eq!(submission.port, 465);
        assert_eq!(submission.security, Security::Tls);

        let store = ServerEndpoint::store("mail.example.com");
        assert_eq!(store.port, 993);
        assert_eq!(store.security, Security::Tls);
    }

    #[test]
    fn test_validate_credentials() {
        let valid = Credentials::new("user@example.com", "secret");
        assert!(validate_credentials(&valid).is_ok());

        let no_address = Credentials::new("  ", "secret");
        assert_eq!(
            validate_credentials(&no_address),
            Err(ValidationError::EmptyAddress)
        );

        let no_secret = Credentials::new("user@example.com", "");
        assert_eq!(
            validate_credentials(&no_secret),
            Err(ValidationError::EmptySecret)
        );
    }

    #[test]
    fn test_validate_recipient() {
        assert!(validate_recipient("friend@example.com").is_ok());
        assert_eq!(validate_recipient(""), Err(ValidationError::EmptyRecipient));
        assert_eq!(
            validate_recipient("   "),
            Err(ValidationError::EmptyRecipient)
        );
    }
}
