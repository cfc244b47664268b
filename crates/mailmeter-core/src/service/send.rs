//! SMTP send engine.
//!
//! Drives one complete submission session — connect, secure, authenticate,
//! envelope, close — and reports the result as a [`TransferOutcome`]. All
//! failures are folded into the outcome; nothing is raised to the caller.

use crate::account::{Credentials, Security, ServerEndpoint};
use crate::error::TransferFailure;
use crate::metrics::{Meter, TransferOutcome, steps};
use mailmeter_smtp::connection::{connect, connect_tls};
use mailmeter_smtp::{Client, SmtpStream};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection-establishment budget for the submission endpoint.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// An email message to send.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl OutgoingMessage {
    /// Creates a new outgoing message.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Builds the RFC 5322 formatted message.
    ///
    /// The UTF-8 byte length of this serialization is the payload-bytes
    /// metric for the send, captured before any network I/O.
    #[must_use]
    pub fn to_rfc5322(&self) -> String {
        let mut message = String::new();

        let _ = write!(message, "From: {}\r\n", self.from);
        let _ = write!(message, "To: {}\r\n", self.to);
        let _ = write!(message, "Subject: {}\r\n", self.subject);
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        message.push_str("Content-Transfer-Encoding: 8bit\r\n");
        message.push_str("\r\n");
        message.push_str(&self.body);

        message
    }
}

/// Sends one message through the submission endpoint.
///
/// The state sequence is linear: connect, secure, authenticate, envelope,
/// close. Any failing step short-circuits; the outcome carries whatever
/// elapsed time and counters accumulated before the failure.
pub async fn send_message(
    credentials: &Credentials,
    endpoint: &ServerEndpoint,
    message: &OutgoingMessage,
) -> TransferOutcome {
    // Serialized before any network I/O so the bytes metric is independent
    // of transport framing.
    let payload = message.to_rfc5322();
    let payload_bytes = payload.len() as u64;

    let mut meter = Meter::start();
    match drive_send(credentials, endpoint, message, &payload, payload_bytes, &mut meter).await
    {
        Ok(()) => meter.success(),
        Err(failure) => {
            warn!(kind = %failure.kind, cause = %failure.cause, "send failed");
            meter.failure(failure)
        }
    }
}

async fn drive_send(
    credentials: &Credentials,
    endpoint: &ServerEndpoint,
    message: &OutgoingMessage,
    payload: &str,
    payload_bytes: u64,
    meter: &mut Meter,
) -> Result<(), TransferFailure> {
    if message.to.trim().is_empty() {
        return Err(TransferFailure::protocol("no recipient specified"));
    }

    // Connected (and secured, for the STARTTLS path).
    debug!(host = %endpoint.host, port = endpoint.port, "connecting to submission endpoint");
    let stream = open_submission_stream(endpoint)
        .await
        .map_err(TransferFailure::connect)?;

    let client = Client::from_stream(stream)
        .await
        .map_err(|e| TransferFailure::connect(e.to_string()))?;
    let client = client
        .ehlo("localhost")
        .await
        .map_err(|e| TransferFailure::connect(e.to_string()))?;
    let client = if endpoint.security == Security::StartTls {
        client
            .starttls(&endpoint.host)
            .await
            .map_err(|e| TransferFailure::connect(e.to_string()))?
    } else {
        client
    };
    meter.record(steps::smtp::CONNECT);

    // Authenticated.
    let client = client
        .auth_plain(&credentials.address, &credentials.secret)
        .await
        .map_err(|e| {
            if e.is_auth_rejection() {
                TransferFailure::auth(e.to_string())
            } else {
                TransferFailure::protocol(e.to_string())
            }
        })?;
    meter.record(steps::smtp::AUTH);

    // Enveloped: sender, recipient, and payload as one transactional unit.
    let client = client
        .send_mail(&message.from, &message.to, payload.as_bytes())
        .await
        .map_err(|e| TransferFailure::protocol(e.to_string()))?;
    meter.record(steps::smtp::ENVELOPE);
    meter.set_payload_bytes(payload_bytes);

    // Closed: best-effort, counted regardless, never the failure cause.
    if let Err(e) = client.quit().await {
        debug!(error = %e, "QUIT failed after successful submission");
    }
    meter.record(steps::smtp::CLOSE);

    Ok(())
}

/// Opens the submission stream per the endpoint's security mode, within the
/// connection budget.
async fn open_submission_stream(endpoint: &ServerEndpoint) -> Result<SmtpStream, String> {
    let opened = match endpoint.security {
        Security::Tls => {
            tokio::time::timeout(CONNECT_TIMEOUT, connect_tls(&endpoint.host, endpoint.port))
                .await
        }
        Security::StartTls | Security::None => {
            tokio::time::timeout(CONNECT_TIMEOUT, connect(&endpoint.host, endpoint.port)).await
        }
    };

    match opened {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!(
            "connection timed out after {}s",
            CONNECT_TIMEOUT.as_secs()
        )),
    }
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
    use crate::error::FailureKind;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    /// Spawns a scripted submission server for one session.
    async fn spawn_submission_server(accept_auth: bool) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);

            reader
                .get_mut()
                .write_all(b"220 mock.example.com ESMTP\r\n")
                .await
                .unwrap();

            let mut in_data = false;
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                let trimmed = line.trim_end().to_uppercase();

                if in_data {
                    if trimmed == "." {
                        in_data = false;
                        reader.get_mut().write_all(b"250 Queued\r\n").await.unwrap();
                    }
                } else if trimmed.starts_with("EHLO") {
                    reader
                        .get_mut()
                        .write_all(b"250-mock.example.com\r\n250 AUTH PLAIN\r\n")
                        .await
                        .unwrap();
                } else if trimmed.starts_with("AUTH PLAIN") {
                    let status: &[u8] = if accept_auth {
                        b"235 Accepted\r\n"
                    } else {
                        b"535 Authentication failed\r\n"
                    };
                    reader.get_mut().write_all(status).await.unwrap();
                } else if trimmed.starts_with("MAIL FROM") || trimmed.starts_with("RCPT TO") {
                    reader.get_mut().write_all(b"250 OK\r\n").await.unwrap();
                } else if trimmed.starts_with("DATA") {
                    in_data = true;
                    reader.get_mut().write_all(b"354 Go ahead\r\n").await.unwrap();
                } else if trimmed.starts_with("QUIT") {
                    reader.get_mut().write_all(b"221 Bye\r\n").await.unwrap();
                    break;
                }
            }
        });

        port
    }

    fn test_message() -> OutgoingMessage {
        OutgoingMessage::new("user@example.com", "friend@example.com", "greetings", "hello")
    }

    #[test]
    fn test_rfc5322_serialization() {
        let message = test_message();
        let payload = message.to_rfc5322();
        assert!(payload.starts_with("From: user@example.com\r\n"));
        assert!(payload.contains("To: friend@example.com\r\n"));
        assert!(payload.contains("Subject: greetings\r\n"));
        assert!(payload.ends_with("\r\nhello"));
    }

    #[tokio::test]
    async fn test_successful_send_metrics() {
        let port = spawn_submission_server(true).await;
        let credentials = Credentials::new("user@example.com", "secret");
        let endpoint = ServerEndpoint::new("127.0.0.1", port, Security::None);
        let message = test_message();

        let outcome = send_message(&credentials, &endpoint, &message).await;

        assert!(outcome.succeeded());
        // Sum of the fixed per-step increments.
        assert_eq!(outcome.packets_sent, 10);
        assert_eq!(outcome.packets_received, 9);
        assert_eq!(outcome.payload_bytes, message.to_rfc5322().len() as u64);
        assert!(outcome.elapsed_secs() >= 0.0);
    }

    #[tokio::test]
    async fn test_auth_failure_is_distinguishable() {
        let port = spawn_submission_server(false).await;
        let credentials = Credentials::new("user@example.com", "wrong");
        let endpoint = ServerEndpoint::new("127.0.0.1", port, Security::None);

        let outcome = send_message(&credentials, &endpoint, &test_message()).await;

        assert!(!outcome.succeeded());
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Auth);
        // Only the connect step completed.
        assert_eq!(outcome.packets_sent, 2);
        assert_eq!(outcome.packets_received, 1);
        assert_eq!(outcome.payload_bytes, 0);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let credentials = Credentials::new("user@example.com", "secret");
        let endpoint = ServerEndpoint::new("127.0.0.1", port, Security::None);

        let outcome = send_message(&credentials, &endpoint, &test_message()).await;

        assert!(!outcome.succeeded());
        let failure = outcome.failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Connect);
        assert_eq!(outcome.packets_sent, 0);
        assert_eq!(outcome.packets_received, 0);
        assert_eq!(outcome.payload_bytes, 0);
        assert!(outcome.elapsed_secs() >= 0.0);
    }

    #[tokio::test]
    async fn test_starttls_is_issued_and_rejection_is_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Scripted server that records every command and refuses the
        // upgrade; the session never reaches AUTH.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            reader
                .get_mut()
                .write_all(b"220 mock.example.com ESMTP\r\n")
                .await
                .unwrap();

            let mut seen = Vec::new();
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                let trimmed = line.trim_end().to_uppercase();
                seen.push(trimmed.clone());

                if trimmed.starts_with("EHLO") {
                    reader
                        .get_mut()
                        .write_all(b"250-mock.example.com\r\n250 STARTTLS\r\n")
                        .await
                        .unwrap();
                } else if trimmed.starts_with("STARTTLS") {
                    reader
                        .get_mut()
                        .write_all(b"454 TLS not available due to temporary reason\r\n")
                        .await
                        .unwrap();
                } else {
                    break;
                }
            }
            seen
        });

        let credentials = Credentials::new("user@example.com", "secret");
        let endpoint = ServerEndpoint::new("127.0.0.1", port, Security::StartTls);

        let outcome = send_message(&credentials, &endpoint, &test_message()).await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.failure.as_ref().unwrap().kind, FailureKind::Connect);
        // The connect step never completed.
        assert_eq!(outcome.packets_sent, 0);
        assert_eq!(outcome.packets_received, 0);

        let seen = assert_ok!(server.await);
        assert!(seen.iter().any(|l| l == "STARTTLS"));
    }

    #[tokio::test]
    async fn test_malformed_greeting_folds_into_outcome() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Multi-byte garbage where the reply code belongs.
            socket.write_all("25€abc\r\n250 OK\r\n".as_bytes()).await.unwrap();
        });

        let credentials = Credentials::new("user@example.com", "secret");
        let endpoint = ServerEndpoint::new("127.0.0.1", port, Security::None);

        let outcome = send_message(&credentials, &endpoint, &test_message()).await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.failure.as_ref().unwrap().kind, FailureKind::Connect);
        assert_eq!(outcome.packets_sent, 0);
    }

    #[tokio::test]
    async fn test_empty_recipient_rejected_before_connecting() {
        let credentials = Credentials::new("user@example.com", "secret");
        let endpoint = ServerEndpoint::new("127.0.0.1", 1, Security::None);
        let message = OutgoingMessage::new("user@example.com", "", "subject", "body");

        let outcome = send_message(&credentials, &endpoint, &message).await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.failure.unwrap().kind, FailureKind::Protocol);
        assert_eq!(outcome.packets_sent, 0);
    }
}
