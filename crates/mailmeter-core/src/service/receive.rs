//! IMAP receive engine.
//!
//! Drives one complete retrieval session — connect, authenticate, select
//! the inbox, search, fetch the newest message, close — and reports a
//! [`TransferOutcome`] plus an optional summary of the fetched message.
//! An empty mailbox is a successful outcome with no summary.

use crate::account::{Credentials, Security, ServerEndpoint};
use crate::error::TransferFailure;
use crate::metrics::{Meter, TransferOutcome, steps};
use mailmeter_imap::connection::{connect_plain, connect_tls};
use mailmeter_imap::{Client, Error as ImapError, ImapStream, parse_message};
use tracing::{debug, warn};

/// Maximum length of the body excerpt, in characters.
pub const BODY_EXCERPT_LIMIT: usize = 500;

/// The well-known inbox mailbox.
const INBOX: &str = "INBOX";

/// Placeholder when the source message has no usable From header.
const UNKNOWN_SENDER: &str = "(Unknown)";

/// Placeholder when the source message has no usable Subject header.
const NO_SUBJECT: &str = "(No Subject)";

/// Summary of the newest fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    /// Sender, or `"(Unknown)"`.
    pub from: String,
    /// Subject, or `"(No Subject)"`.
    pub subject: String,
    /// Body excerpt, truncated to [`BODY_EXCERPT_LIMIT`] characters.
    pub body_excerpt: String,
}

/// Retrieves the most recent message from the store endpoint's inbox.
///
/// Returns the transfer outcome and, when the mailbox holds at least one
/// message, a summary of the newest one. The payload-bytes metric is the
/// length of the raw fetched content, not the truncated excerpt.
///
/// An empty mailbox still runs the logout step, so its packet estimate
/// covers the full connect-through-close sequence (7 sent, 6 received)
/// rather than stopping at the search.
pub async fn receive_latest(
    credentials: &Credentials,
    endpoint: &ServerEndpoint,
) -> (TransferOutcome, Option<MessageSummary>) {
    let mut meter = Meter::start();
    match drive_receive(credentials, endpoint, &mut meter).await {
        Ok(summary) => (meter.success(), summary),
        Err(failure) => {
            warn!(kind = %failure.kind, cause = %failure.cause, "receive failed");
            (meter.failure(failure), None)
        }
    }
}

async fn drive_receive(
    credentials: &Credentials,
    endpoint: &ServerEndpoint,
    meter: &mut Meter,
) -> Result<Option<MessageSummary>, TransferFailure> {
    // Connected.
    debug!(host = %endpoint.host, port = endpoint.port, "connecting to store endpoint");
    let stream = open_store_stream(endpoint).await?;
    let client = Client::from_stream(stream)
        .await
        .map_err(|e| TransferFailure::connect(e.to_string()))?;
    meter.record(steps::imap::CONNECT);

    // Authenticated.
    let client = client
        .login(&credentials.address, &credentials.secret)
        .await
        .map_err(|e| match e {
            ImapError::No(_) => TransferFailure::auth(e.to_string()),
            ImapError::Io(_) | ImapError::Tls(_) => TransferFailure::connect(e.to_string()),
            _ => TransferFailure::protocol(e.to_string()),
        })?;
    meter.record(steps::imap::LOGIN);

    // MailboxSelected.
    let (mut client, info) = client
        .select(INBOX)
        .await
        .map_err(|e| TransferFailure::protocol(e.to_string()))?;
    meter.record(steps::imap::SELECT);
    debug!(exists = info.exists, "inbox selected");

    // Searched.
    let ids = client
        .search_all()
        .await
        .map_err(|e| TransferFailure::protocol(e.to_string()))?;
    meter.record(steps::imap::SEARCH);

    // An empty mailbox is a successful outcome with no summary.
    let Some(&latest) = ids.last() else {
        debug!("mailbox is empty");
        close_store(client, meter).await;
        return Ok(None);
    };

    // Fetched: the positionally last identifier is the newest message.
    let raw = client
        .fetch_raw(latest)
        .await
        .map_err(|e| TransferFailure::protocol(e.to_string()))?;
    meter.record(steps::imap::FETCH);
    meter.set_payload_bytes(raw.len() as u64);

    let summary = summarize(&raw);

    // Closed.
    close_store(client, meter).await;
    Ok(Some(summary))
}

/// Best-effort logout; counted regardless, never a failure cause.
async fn close_store<S>(client: Client<S>, meter: &mut Meter) {
    if let Err(e) = client.logout().await {
        debug!(error = %e, "LOGOUT failed after completed retrieval");
    }
    meter.record(steps::imap::CLOSE);
}

/// Parses raw fetched content into a summary, applying the documented
/// placeholders and the excerpt limit.
fn summarize(raw: &[u8]) -> MessageSummary {
    let parsed = parse_message(raw);

    MessageSummary {
        from: parsed
            .from
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
        subject: parsed
            .subject
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SUBJECT.to_string()),
        body_excerpt: parsed.body.chars().take(BODY_EXCERPT_LIMIT).collect(),
    }
}

/// Opens the store stream per the endpoint's security mode.
async fn open_store_stream(endpoint: &ServerEndpoint) -> Result<ImapStream, TransferFailure> {
    match endpoint.security {
        Security::Tls => connect_tls(&endpoint.host, endpoint.port)
            .await
            .map_err(|e| TransferFailure::connect(e.to_string())),
        Security::None => connect_plain(&endpoint.host, endpoint.port)
            .await
            .map_err(|e| TransferFailure::connect(e.to_string())),
        Security::StartTls => Err(TransferFailure::connect(
            "STARTTLS is not supported for the store endpoint",
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

    /// Spawns a scripted store server holding `messages` raw messages.
    /// The password "wrong" is rejected with NO.
    async fn spawn_store_server(messages: Vec<Vec<u8>>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);

            reader
                .get_mut()
                .write_all(b"* OK IMAP4rev1 ready\r\n")
                .await
                .unwrap();

            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                let trimmed = line.trim_end();
                let Some((tag, rest)) = trimmed.split_once(' ') else {
                    continue;
                };
                let upper = rest.to_uppercase();

                if upper.starts_with("LOGIN") {
                    let reply = if rest.contains("\"wrong\"") {
                        format!("{tag} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
                    } else {
                        format!("{tag} OK LOGIN completed\r\n")
                    };
                    reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
                } else if upper.starts_with("SELECT") {
                    let reply = format!(
                        "* {} EXISTS\r\n{tag} OK [READ-WRITE] SELECT completed\r\n",
                        messages.len()
                    );
                    reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
                } else if upper.starts_with("SEARCH") {
                    let ids: Vec<String> =
                        (1..=messages.len()).map(|n| n.to_string()).collect();
                    let listing = if ids.is_empty() {
                        "* SEARCH\r\n".to_string()
                    } else {
                        format!("* SEARCH {}\r\n", ids.join(" "))
                    };
                    let reply = format!("{listing}{tag} OK SEARCH completed\r\n");
                    reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
                } else if upper.starts_with("FETCH") {
                    let seq: usize = rest
                        .split_whitespace()
                        .nth(1)
                        .and_then(|s| s.parse().ok())
                        .unwrap();
                    let msg = &messages[seq - 1];
                    let header = format!("* {seq} FETCH (RFC822 {{{}}}\r\n", msg.len());
                    reader.get_mut().write_all(header.as_bytes()).await.unwrap();
                    reader.get_mut().write_all(msg).await.unwrap();
                    reader.get_mut().write_all(b")\r\n").await.unwrap();
                    let reply = format!("{tag} OK FETCH completed\r\n");
                    reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
                } else if upper.starts_with("LOGOUT") {
                    let reply = format!("* BYE logging out\r\n{tag} OK LOGOUT completed\r\n");
                    reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
                    break;
                }
            }
        });

        port
    }

    fn store_endpoint(port: u16) -> ServerEndpoint {
        ServerEndpoint::new("127.0.0.1", port, Security::None)
    }

    const CREDS: (&str, &str) = ("user@example.com", "secret");

    #[tokio::test]
    async fn test_receive_latest_message() {
        let raw =
            b"From: alice@example.com\r\nSubject: greetings\r\n\r\nhello from alice\r\n".to_vec();
        let raw_len = raw.len() as u64;
        let port = spawn_store_server(vec![raw]).await;

        let credentials = Credentials::new(CREDS.0, CREDS.1);
        let (outcome, summary) = receive_latest(&credentials, &store_endpoint(port)).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.payload_bytes, raw_len);
        // connect 2/1, login 1/1, select 1/1, search 1/1, fetch 1/2, close 2/2
        assert_eq!(outcome.packets_sent, 8);
        assert_eq!(outcome.packets_received, 8);

        let summary = summary.unwrap();
        assert_eq!(summary.from, "alice@example.com");
        assert_eq!(summary.subject, "greetings");
        assert_eq!(summary.body_excerpt.trim_end(), "hello from alice");
    }

    #[tokio::test]
    async fn test_newest_message_is_fetched() {
        let older = b"Subject: old\r\n\r\nfirst\r\n".to_vec();
        let newer = b"Subject: new\r\n\r\nsecond\r\n".to_vec();
        let port = spawn_store_server(vec![older, newer]).await;

        let credentials = Credentials::new(CREDS.0, CREDS.1);
        let (outcome, summary) = receive_latest(&credentials, &store_endpoint(port)).await;

        assert!(outcome.succeeded());
        assert_eq!(summary.unwrap().subject, "new");
    }

    #[tokio::test]
    async fn test_empty_mailbox_is_success() {
        let port = spawn_store_server(vec![]).await;

        let credentials = Credentials::new(CREDS.0, CREDS.1);
        let (outcome, summary) = receive_latest(&credentials, &store_endpoint(port)).await;

        assert!(outcome.succeeded());
        assert!(summary.is_none());
        assert_eq!(outcome.payload_bytes, 0);
        // connect 2/1, login 1/1, select 1/1, search 1/1, close 2/2
        assert_eq!(outcome.packets_sent, 7);
        assert_eq!(outcome.packets_received, 6);
    }

    #[tokio::test]
    async fn test_excerpt_truncated_but_bytes_reflect_raw_content() {
        let long_body = "x".repeat(2000);
        let raw = format!("From: a@b.c\r\nSubject: long\r\n\r\n{long_body}").into_bytes();
        let raw_len = raw.len() as u64;
        let port = spawn_store_server(vec![raw]).await;

        let credentials = Credentials::new(CREDS.0, CREDS.1);
        let (outcome, summary) = receive_latest(&credentials, &store_endpoint(port)).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.payload_bytes, raw_len);
        assert_eq!(summary.unwrap().body_excerpt.chars().count(), BODY_EXCERPT_LIMIT);
    }

    #[tokio::test]
    async fn test_placeholder_headers() {
        let raw = b"Date: today\r\n\r\nanonymous body\r\n".to_vec();
        let port = spawn_store_server(vec![raw]).await;

        let credentials = Credentials::new(CREDS.0, CREDS.1);
        let (_, summary) = receive_latest(&credentials, &store_endpoint(port)).await;

        let summary = summary.unwrap();
        assert_eq!(summary.from, "(Unknown)");
        assert_eq!(summary.subject, "(No Subject)");
    }

    #[tokio::test]
    async fn test_auth_failure_is_distinguishable() {
        let port = spawn_store_server(vec![]).await;

        let credentials = Credentials::new("user@example.com", "wrong");
        let (outcome, summary) = receive_latest(&credentials, &store_endpoint(port)).await;

        assert!(!outcome.succeeded());
        assert!(summary.is_none());
        assert_eq!(outcome.failure.unwrap().kind, FailureKind::Auth);
        // Only the connect step completed.
        assert_eq!(outcome.packets_sent, 2);
        assert_eq!(outcome.packets_received, 1);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let credentials = Credentials::new(CREDS.0, CREDS.1);
        let (outcome, summary) = receive_latest(&credentials, &store_endpoint(port)).await;

        assert!(!outcome.succeeded());
        assert!(summary.is_none());
        assert_eq!(outcome.failure.as_ref().unwrap().kind, FailureKind::Connect);
        assert!(outcome.elapsed_secs() >= 0.0);
    }
}
