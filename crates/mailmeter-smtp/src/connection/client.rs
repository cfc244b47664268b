//! Type-state SMTP client.

use super::SmtpStream;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{Reply, is_last_reply_line, parse_reply};
use std::marker::PhantomData;
use tracing::debug;

/// Type-state marker for the connected (pre-auth) state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for the authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// SMTP client with type-state tracking of the protocol phase.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    _state: PhantomData<State>,
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server
    /// refuses the session.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = Self::read_reply(&mut stream).await?;
        if !greeting.is_success() {
            return Err(Error::rejected(greeting.code, greeting.text()));
        }
        debug!(code = greeting.code, "SMTP greeting");

        Ok(Self {
            stream,
            _state: PhantomData,
        })
    }

    /// Sends EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the greeting.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        if !reply.is_success() {
            return Err(Error::rejected(reply.code, reply.text()));
        }
        Ok(self)
    }

    /// Upgrades the connection to TLS via STARTTLS and re-issues EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects STARTTLS or the TLS
    /// handshake fails.
    pub async fn starttls(mut self, hostname: &str) -> Result<Self> {
        let reply = self.send_command(&Command::StartTls).await?;
        if !reply.is_success() {
            return Err(Error::rejected(reply.code, reply.text()));
        }

        self.stream = self.stream.upgrade_to_tls(hostname).await?;
        debug!("upgraded SMTP stream to TLS");

        // EHLO state is reset by the TLS upgrade.
        self.ehlo(hostname).await
    }

    /// Authenticates with AUTH PLAIN.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credentials; check
    /// [`Error::is_auth_rejection`] to distinguish that from transport
    /// failures.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let reply = self
            .send_command(&Command::AuthPlain {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;

        if !reply.is_success() {
            return Err(Error::rejected(reply.code, reply.text()));
        }

        Ok(Client {
            stream: self.stream,
            _state: PhantomData,
        })
    }
}

impl Client<Authenticated> {
    /// Runs one complete mail transaction: MAIL FROM, RCPT TO, DATA,
    /// message body, terminating dot.
    ///
    /// The message should be RFC 5322 text; line endings are normalized to
    /// CRLF and leading dots are byte-stuffed.
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the transaction is rejected.
    pub async fn send_mail(mut self, from: &str, to: &str, message: &[u8]) -> Result<Self> {
        let reply = self
            .send_command(&Command::MailFrom {
                from: from.to_string(),
            })
            .await?;
        if !reply.is_success() {
            return Err(Error::rejected(reply.code, reply.text()));
        }

        let reply = self
            .send_command(&Command::RcptTo { to: to.to_string() })
            .await?;
        if !reply.is_success() {
            return Err(Error::rejected(reply.code, reply.text()));
        }

        let reply = self.send_command(&Command::Data).await?;
        if reply.code != 354 {
            return Err(Error::rejected(reply.code, reply.text()));
        }

        for line in message.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            // Byte-stuff lines starting with '.'
            if line.first() == Some(&b'.') {
                self.stream.write_all(b".").await?;
            }
            self.stream.write_all(line).await?;
            self.stream.write_all(b"\r\n").await?;
        }
        self.stream.write_all(b".\r\n").await?;

        let reply = Self::read_reply(&mut self.stream).await?;
        if !reply.is_success() {
            return Err(Error::rejected(reply.code, reply.text()));
        }
        debug!(code = reply.code, "message accepted");

        Ok(self)
    }
}

impl<S> Client<S> {
    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        self.stream.write_all(cmd.serialize().as_bytes()).await?;
        Self::read_reply(&mut self.stream).await
    }

    async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = stream.read_line().await?;
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
        }

        parse_reply(&lines)
    }

    /// Sends QUIT and drops the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if QUIT itself cannot be written or is rejected.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(Error::rejected(reply.code, reply.text()));
        }
        Ok(())
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
    use crate::connection::connect;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    /// Spawns a scripted submission server speaking one full session.
    ///
    /// Returns the bound port and a handle yielding the message body the
    /// server received between DATA and the terminating dot.
    async fn spawn_submission_server(
        accept_auth: bool,
    ) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut body = Vec::new();

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
                let trimmed = line.trim_end().to_string();

                if in_data {
                    if trimmed == "." {
                        in_data = false;
                        reader.get_mut().write_all(b"250 Queued\r\n").await.unwrap();
                    } else {
                        body.push(trimmed);
                    }
                    continue;
                }

                let upper = trimmed.to_uppercase();
                if upper.starts_with("EHLO") {
                    reader
                        .get_mut()
                        .write_all(b"250-mock.example.com\r\n250 AUTH PLAIN\r\n")
                        .await
                        .unwrap();
                } else if upper.starts_with("AUTH PLAIN") {
                    let status: &[u8] = if accept_auth {
                        b"235 Accepted\r\n"
                    } else {
                        b"535 Authentication failed\r\n"
                    };
                    reader.get_mut().write_all(status).await.unwrap();
                } else if upper.starts_with("MAIL FROM") || upper.starts_with("RCPT TO") {
                    reader.get_mut().write_all(b"250 OK\r\n").await.unwrap();
                } else if upper.starts_with("DATA") {
                    in_data = true;
                    reader
                        .get_mut()
                        .write_all(b"354 End data with <CRLF>.<CRLF>\r\n")
                        .await
                        .unwrap();
                } else if upper.starts_with("QUIT") {
                    reader.get_mut().write_all(b"221 Bye\r\n").await.unwrap();
                    break;
                } else {
                    reader
                        .get_mut()
                        .write_all(b"500 Unrecognized\r\n")
                        .await
                        .unwrap();
                }
            }

            body
        });

        (port, handle)
    }

    #[tokio::test]
    async fn test_full_session() {
        let (port, server) = spawn_submission_server(true).await;

        let stream = assert_ok!(connect("127.0.0.1", port).await);
        let client = assert_ok!(Client::from_stream(stream).await);
        let client = assert_ok!(client.ehlo("localhost").await);
        let client = assert_ok!(client.auth_plain("user", "pass").await);
        let client = assert_ok!(
            client
                .send_mail(
                    "user@example.com",
                    "friend@example.com",
                    b"Subject: hi\r\n\r\nhello",
                )
                .await
        );
        assert_ok!(client.quit().await);

        let body = server.await.unwrap();
        assert!(body.contains(&"Subject: hi".to_string()));
        assert!(body.contains(&"hello".to_string()));
    }

    #[tokio::test]
    async fn test_auth_rejection_is_distinguishable() {
        let (port, _server) = spawn_submission_server(false).await;

        let stream = connect("127.0.0.1", port).await.unwrap();
        let client = Client::from_stream(stream).await.unwrap();
        let client = client.ehlo("localhost").await.unwrap();
        let err = client.auth_plain("user", "wrong").await.unwrap_err();
        assert!(err.is_auth_rejection());
    }

    #[tokio::test]
    async fn test_dot_stuffing() {
        let (port, server) = spawn_submission_server(true).await;

        let stream = connect("127.0.0.1", port).await.unwrap();
        let client = Client::from_stream(stream).await.unwrap();
        let client = client.ehlo("localhost").await.unwrap();
        let client = client.auth_plain("user", "pass").await.unwrap();
        let client = client
            .send_mail("a@b.c", "d@e.f", b"Subject: s\r\n\r\n.leading dot")
            .await
            .unwrap();
        client.quit().await.unwrap();

        let body = server.await.unwrap();
        // The transparency dot is doubled on the wire.
        assert!(body.contains(&"..leading dot".to_string()));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connect("127.0.0.1", port).await;
        assert!(result.is_err());
    }
}
