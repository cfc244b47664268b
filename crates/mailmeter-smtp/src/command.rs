//! SMTP command builder.

use base64::Engine;

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - extended greeting.
    Ehlo {
        /// Client hostname.
        hostname: String,
    },
    /// STARTTLS - upgrade to TLS.
    StartTls,
    /// AUTH PLAIN with inline SASL-IR response.
    AuthPlain {
        /// Username (usually the sender address).
        username: String,
        /// Password.
        password: String,
    },
    /// MAIL FROM - start the mail transaction.
    MailFrom {
        /// Sender address.
        from: String,
    },
    /// RCPT TO - add the recipient.
    RcptTo {
        /// Recipient address.
        to: String,
    },
    /// DATA - begin message data.
    Data,
    /// QUIT - close the connection.
    Quit,
}

impl Command {
    /// Serializes the command to a CRLF-terminated line.
    #[must_use]
    pub fn serialize(&self) -> String {
        match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}\r\n"),
            Self::StartTls => "STARTTLS\r\n".to_string(),
            Self::AuthPlain { username, password } => {
                // PLAIN initial response: \0username\0password, base64-encoded
                let raw = format!("\0{username}\0{password}");
                let encoded =
                    base64::engine::general_purpose::STANDARD.encode(raw.as_bytes());
                format!("AUTH PLAIN {encoded}\r\n")
            }
            Self::MailFrom { from } => format!("MAIL FROM:<{from}>\r\n"),
            Self::RcptTo { to } => format!("RCPT TO:<{to}>\r\n"),
            Self::Data => "DATA\r\n".to_string(),
            Self::Quit => "QUIT\r\n".to_string(),
        }
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

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "localhost".to_string(),
        };
        assert_eq!(cmd.serialize(), "EHLO localhost\r\n");
    }

    #[test]
    fn test_starttls_command() {
        assert_eq!(Command::StartTls.serialize(), "STARTTLS\r\n");
    }

    #[test]
    fn test_auth_plain_encoding() {
        let cmd = Command::AuthPlain {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        // base64("\0user\0pass")
        assert_eq!(cmd.serialize(), "AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
    }

    #[test]
    fn test_mail_from_command() {
        let cmd = Command::MailFrom {
            from: "sender@example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), "MAIL FROM:<sender@example.com>\r\n");
    }

    #[test]
    fn test_rcpt_to_command() {
        let cmd = Command::RcptTo {
            to: "recipient@example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), "RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn test_data_command() {
        assert_eq!(Command::Data.serialize(), "DATA\r\n");
    }

    #[test]
    fn test_quit_command() {
        assert_eq!(Command::Quit.serialize(), "QUIT\r\n");
    }
}
