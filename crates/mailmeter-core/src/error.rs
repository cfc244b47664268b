//! Failure classification for transfer outcomes.
//!
//! Engines never propagate errors to their callers; every failure is folded
//! into the returned outcome as a [`TransferFailure`]. Callers distinguish
//! failure kinds by inspecting the outcome, never by catching error types.

use std::fmt;

/// The kind of failure a transfer ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport could not be established (unreachable host, timeout, TLS
    /// negotiation failure).
    Connect,
    /// Credentials rejected by the remote server.
    Auth,
    /// A well-formed request was rejected at the protocol level.
    Protocol,
    /// Dispatcher-local push failure; never affects the triggering transfer.
    Notification,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connection failed"),
            Self::Auth => write!(f, "authentication failed"),
            Self::Protocol => write!(f, "protocol error"),
            Self::Notification => write!(f, "notification failed"),
        }
    }
}

/// A classified failure with a short human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable cause string.
    pub cause: String,
}

impl TransferFailure {
    /// Creates a failure.
    #[must_use]
    pub fn new(kind: FailureKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    /// Creates a connection failure.
    #[must_use]
    pub fn connect(cause: impl Into<String>) -> Self {
        Self::new(FailureKind::Connect, cause)
    }

    /// Creates an authentication failure.
    #[must_use]
    pub fn auth(cause: impl Into<String>) -> Self {
        Self::new(FailureKind::Auth, cause)
    }

    /// Creates a protocol failure.
    #[must_use]
    pub fn protocol(cause: impl Into<String>) -> Self {
        Self::new(FailureKind::Protocol, cause)
    }

    /// Creates a notification failure.
    #[must_use]
    pub fn notification(cause: impl Into<String>) -> Self {
        Self::new(FailureKind::Notification, cause)
    }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.cause)
    }
}
