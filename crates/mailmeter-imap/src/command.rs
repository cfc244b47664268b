//! IMAP command serialization and tag generation.

use std::sync::atomic::{AtomicU32, Ordering};

/// Tag generator for IMAP commands.
///
/// Generates sequential tags in the format "A0000", "A0001", etc. Tags match
/// commands with their completion responses.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
}

impl TagGenerator {
    /// Creates a new generator starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
        }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("A{n:04}")
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// LOGIN with username and password.
    Login {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// SELECT a mailbox.
    Select {
        /// Mailbox name.
        mailbox: String,
    },
    /// SEARCH ALL - every message sequence number in the mailbox.
    SearchAll,
    /// FETCH the full RFC 822 content of one message.
    Fetch {
        /// Message sequence number.
        sequence: u32,
    },
    /// LOGOUT - end the session.
    Logout,
}

impl Command {
    /// Serializes the command with its tag to a CRLF-terminated line.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> String {
        match self {
            Self::Login { username, password } => {
                format!(
                    "{tag} LOGIN {} {}\r\n",
                    quote_string(username),
                    quote_string(password)
                )
            }
            Self::Select { mailbox } => format!("{tag} SELECT {}\r\n", quote_string(mailbox)),
            Self::SearchAll => format!("{tag} SEARCH ALL\r\n"),
            Self::Fetch { sequence } => format!("{tag} FETCH {sequence} (RFC822)\r\n"),
            Self::Logout => format!("{tag} LOGOUT\r\n"),
        }
    }
}

/// Quotes a string per the IMAP grammar, escaping backslash and quote.
fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
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
    fn test_tag_generation() {
        let tags = TagGenerator::new();
        assert_eq!(tags.next(), "A0000");
        assert_eq!(tags.next(), "A0001");
        assert_eq!(tags.next(), "A0002");
    }

    #[test]
    fn test_login_serialization() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(
            cmd.serialize("A0000"),
            "A0000 LOGIN \"user@example.com\" \"secret\"\r\n"
        );
    }

    #[test]
    fn test_login_escapes_quotes() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "pa\"ss\\word".to_string(),
        };
        assert_eq!(
            cmd.serialize("A0001"),
            "A0001 LOGIN \"user\" \"pa\\\"ss\\\\word\"\r\n"
        );
    }

    #[test]
    fn test_select_serialization() {
        let cmd = Command::Select {
            mailbox: "INBOX".to_string(),
        };
        assert_eq!(cmd.serialize("A0002"), "A0002 SELECT \"INBOX\"\r\n");
    }

    #[test]
    fn test_search_all_serialization() {
        assert_eq!(Command::SearchAll.serialize("A0003"), "A0003 SEARCH ALL\r\n");
    }

    #[test]
    fn test_fetch_serialization() {
        let cmd = Command::Fetch { sequence: 42 };
        assert_eq!(cmd.serialize("A0004"), "A0004 FETCH 42 (RFC822)\r\n");
    }

    #[test]
    fn test_logout_serialization() {
        assert_eq!(Command::Logout.serialize("A0005"), "A0005 LOGOUT\r\n");
    }
}
