//! Type-state IMAP client.
//!
//! The connection states are:
//!
//! - `NotAuthenticated`: initial state after connecting
//! - `Authenticated`: after successful LOGIN
//! - `Selected`: after successful SELECT
//!
//! Each state only exposes the methods valid for that state.

use super::ImapStream;
use crate::command::{Command, TagGenerator};
use crate::error::{Error, Result};
use std::marker::PhantomData;
use tracing::debug;

/// Marker type for the not-authenticated state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Marker type for the authenticated state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// Marker type for the selected-mailbox state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selected;

/// Message counts reported by SELECT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxInfo {
    /// Number of messages in the mailbox.
    pub exists: u32,
}

/// One server response line, with its trailing literal when present.
#[derive(Debug)]
struct ResponseLine {
    text: String,
    literal: Option<Vec<u8>>,
}

/// IMAP client with type-state tracking of the session phase.
#[derive(Debug)]
pub struct Client<State> {
    stream: ImapStream,
    tags: TagGenerator,
    _state: PhantomData<State>,
}

impl Client<NotAuthenticated> {
    /// Creates a client from a connected stream and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting cannot be read or the server is
    /// refusing connections.
    pub async fn from_stream(mut stream: ImapStream) -> Result<Self> {
        let greeting = stream.read_line().await?;
        if greeting.starts_with("* BYE") {
            return Err(Error::Bye(greeting));
        }
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(Error::Protocol(format!("unexpected greeting: {greeting}")));
        }
        debug!("IMAP greeting received");

        Ok(Self {
            stream,
            tags: TagGenerator::default(),
            _state: PhantomData,
        })
    }

    /// Authenticates with LOGIN.
    ///
    /// Consumes self and returns an authenticated client on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`] if the server rejects the credentials.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let cmd = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.run_command(&cmd).await?;

        Ok(Client {
            stream: self.stream,
            tags: self.tags,
            _state: PhantomData,
        })
    }
}

impl Client<Authenticated> {
    /// Selects a mailbox.
    ///
    /// Consumes self and returns a selected client plus the message counts
    /// the server reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses the mailbox.
    pub async fn select(mut self, mailbox: &str) -> Result<(Client<Selected>, MailboxInfo)> {
        let cmd = Command::Select {
            mailbox: mailbox.to_string(),
        };
        let responses = self.run_command(&cmd).await?;

        let mut info = MailboxInfo::default();
        for response in &responses {
            // Untagged "* <n> EXISTS"
            let mut words = response.text.split_whitespace();
            if words.next() == Some("*")
                && let Some(n) = words.next()
                && words.next() == Some("EXISTS")
                && let Ok(count) = n.parse()
            {
                info.exists = count;
            }
        }

        Ok((
            Client {
                stream: self.stream,
                tags: self.tags,
                _state: PhantomData,
            },
            info,
        ))
    }
}

impl Client<Selected> {
    /// Returns every message sequence number in the selected mailbox.
    ///
    /// An empty mailbox yields an empty vector, which is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the SEARCH command fails.
    pub async fn search_all(&mut self) -> Result<Vec<u32>> {
        let responses = self.run_command(&Command::SearchAll).await?;

        let mut ids = Vec::new();
        for response in &responses {
            if let Some(rest) = response.text.strip_prefix("* SEARCH") {
                for word in rest.split_whitespace() {
                    if let Ok(id) = word.parse() {
                        ids.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }

    /// Fetches the full raw RFC 822 content of one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the FETCH command fails or the server returns
    /// no content for the message.
    pub async fn fetch_raw(&mut self, sequence: u32) -> Result<Vec<u8>> {
        let responses = self.run_command(&Command::Fetch { sequence }).await?;

        for response in responses {
            if response.text.starts_with('*')
                && response.text.contains("FETCH")
                && let Some(literal) = response.literal
            {
                return Ok(literal);
            }
        }

        Err(Error::Protocol(format!(
            "FETCH {sequence} returned no message content"
        )))
    }
}

impl<S> Client<S> {
    /// Sends one command and reads responses through its tagged completion,
    /// which must be OK.
    async fn run_command(&mut self, cmd: &Command) -> Result<Vec<ResponseLine>> {
        let tag = self.tags.next();
        self.stream
            .write_all(cmd.serialize(&tag).as_bytes())
            .await?;

        let responses = Self::read_until_tagged(&mut self.stream, &tag).await?;
        Self::check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    /// Reads response lines (attaching literals) until the tagged response.
    async fn read_until_tagged(
        stream: &mut ImapStream,
        tag: &str,
    ) -> Result<Vec<ResponseLine>> {
        let mut responses = Vec::new();
        loop {
            let response = Self::read_response_line(stream).await?;
            let done = response.text.starts_with(tag)
                && response.text[tag.len()..].starts_with(' ');
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    /// Reads one line; if it announces a literal (`{n}` suffix), reads the
    /// literal bytes as well.
    async fn read_response_line(stream: &mut ImapStream) -> Result<ResponseLine> {
        let text = stream.read_line().await?;
        let literal = match literal_length(&text) {
            Some(len) => Some(stream.read_exact(len).await?),
            None => None,
        };
        Ok(ResponseLine { text, literal })
    }

    /// Checks that the tagged completion is OK.
    fn check_tagged_ok(responses: &[ResponseLine], tag: &str) -> Result<()> {
        for response in responses.iter().rev() {
            let Some(rest) = response.text.strip_prefix(tag) else {
                continue;
            };
            let Some(rest) = rest.strip_prefix(' ') else {
                continue;
            };

            let (status, text) = rest.split_once(' ').unwrap_or((rest, ""));
            return match status {
                "OK" => Ok(()),
                "NO" => Err(Error::No(text.to_string())),
                "BAD" => Err(Error::Bad(text.to_string())),
                "BYE" => Err(Error::Bye(text.to_string())),
                other => Err(Error::Protocol(format!("unknown status: {other}"))),
            };
        }

        Err(Error::Protocol("missing tagged response".to_string()))
    }

    /// Gracefully ends the session (available in any state, best-effort).
    ///
    /// # Errors
    ///
    /// Returns an error only if the LOGOUT command cannot be written.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tags.next();
        self.stream
            .write_all(Command::Logout.serialize(&tag).as_bytes())
            .await?;

        // Servers reply "* BYE" then the tagged OK; tolerate anything.
        let _ = Self::read_until_tagged(&mut self.stream, &tag).await;
        Ok(())
    }
}

/// Parses a trailing IMAP literal announcement (`{n}` at end of line).
fn literal_length(line: &str) -> Option<usize> {
    let rest = line.strip_suffix('}')?;
    let open = rest.rfind('{')?;
    rest[open + 1..].parse().ok()
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
    use crate::connection::connect_plain;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length("* 1 FETCH (RFC822 {342}"), Some(342));
        assert_eq!(literal_length("* 1 FETCH (RFC822 {0}"), Some(0));
        assert_eq!(literal_length("* SEARCH 1 2 3"), None);
        assert_eq!(literal_length("A0000 OK done"), None);
    }

    /// Spawns a scripted IMAP server holding `messages` raw messages.
    /// A wrong password is rejected with NO.
    async fn spawn_store_server(messages: Vec<&'static [u8]>) -> u16 {
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
                        "* {} EXISTS\r\n* 0 RECENT\r\n{tag} OK [READ-WRITE] SELECT completed\r\n",
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
                    let msg = messages[seq - 1];
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

    const RAW_MESSAGE: &[u8] =
        b"From: alice@example.com\r\nSubject: greetings\r\n\r\nhello from alice\r\n";

    #[tokio::test]
    async fn test_full_session_with_one_message() {
        let port = spawn_store_server(vec![RAW_MESSAGE]).await;

        let stream = assert_ok!(connect_plain("127.0.0.1", port).await);
        let client = assert_ok!(Client::from_stream(stream).await);
        let client = assert_ok!(client.login("user", "pass").await);
        let (mut client, info) = assert_ok!(client.select("INBOX").await);
        assert_eq!(info.exists, 1);

        let ids = assert_ok!(client.search_all().await);
        assert_eq!(ids, vec![1]);

        let raw = assert_ok!(client.fetch_raw(1).await);
        assert_eq!(raw, RAW_MESSAGE);

        assert_ok!(client.logout().await);
    }

    #[tokio::test]
    async fn test_empty_mailbox_search() {
        let port = spawn_store_server(vec![]).await;

        let stream = connect_plain("127.0.0.1", port).await.unwrap();
        let client = Client::from_stream(stream).await.unwrap();
        let client = client.login("user", "pass").await.unwrap();
        let (mut client, info) = client.select("INBOX").await.unwrap();
        assert_eq!(info.exists, 0);

        let ids = client.search_all().await.unwrap();
        assert!(ids.is_empty());

        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejection() {
        let port = spawn_store_server(vec![]).await;

        let stream = connect_plain("127.0.0.1", port).await.unwrap();
        let client = Client::from_stream(stream).await.unwrap();
        let err = client.login("user", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::No(_)));
    }
}
