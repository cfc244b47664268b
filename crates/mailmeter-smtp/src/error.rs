//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server rejected a command.
    #[error("SMTP error {code}: {message}")]
    Rejected {
        /// Reply code (e.g. 550).
        code: u16,
        /// Message text from the server.
        message: String,
    },

    /// Protocol error (malformed or unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Creates a rejection error from a reply code and message.
    #[must_use]
    pub fn rejected(code: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the server rejected the submitted credentials.
    ///
    /// Covers 535 (authentication credentials invalid) and 530
    /// (authentication required).
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Rejected { code: 535 | 530, .. })
    }
}
