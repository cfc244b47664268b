//! SMTP reply parser.

use crate::error::{Error, Result};

/// A complete SMTP reply, possibly spanning multiple lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit reply code.
    pub code: u16,
    /// Message text, one entry per reply line (code stripped).
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a reply.
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns true for positive completion replies (2xx) and the
    /// intermediate 3xx replies (e.g. 354 after DATA).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 400
    }

    /// Returns the message text joined into one string.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

/// Parses an SMTP reply from its raw lines.
///
/// Replies are single-line (`250 OK`) or multi-line
/// (`250-one`, `250-two`, `250 last`).
///
/// # Errors
///
/// Returns an error if the reply is empty or malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let first = lines
        .first()
        .ok_or_else(|| Error::Protocol("empty reply".into()))?;

    // Reply text is server-controlled; slice via get() so a multi-byte
    // character at the boundary is a protocol error, not a panic.
    let code = first
        .get(0..3)
        .and_then(|digits| digits.parse::<u16>().ok())
        .ok_or_else(|| Error::Protocol(format!("invalid reply code: {first}")))?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if line.len() == 3 {
            message.push(String::new());
        } else if let Some(text) = line.get(4..) {
            // Strip "250-" or "250 " prefix.
            message.push(text.to_string());
        } else {
            return Err(Error::Protocol(format!("malformed reply line: {line}")));
        }
    }

    Ok(Reply::new(code, message))
}

/// Checks whether a line terminates a reply.
///
/// Continuation lines use `-` after the code; the last line uses a space
/// (or is a bare three-digit code).
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() == 3 || (line.len() >= 4 && line.as_bytes()[3] == b' ')
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
    fn test_parse_single_line() {
        let reply = parse_reply(&["250 OK".to_string()]).unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.lines, vec!["OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_parse_multi_line() {
        let lines = vec![
            "250-mail.example.com".to_string(),
            "250-AUTH PLAIN LOGIN".to_string(),
            "250 STARTTLS".to_string(),
        ];
        let reply = parse_reply(&lines).unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.lines.len(), 3);
        assert_eq!(reply.text(), "mail.example.com AUTH PLAIN LOGIN STARTTLS");
    }

    #[test]
    fn test_intermediate_reply_is_success() {
        let reply = parse_reply(&["354 End data with <CRLF>.<CRLF>".to_string()]).unwrap();
        assert!(reply.is_success());
    }

    #[test]
    fn test_rejection_is_not_success() {
        let reply = parse_reply(&["535 Authentication failed".to_string()]).unwrap();
        assert!(!reply.is_success());
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("250-continuing"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_reply(&[]).is_err());
        assert!(parse_reply(&["25".to_string()]).is_err());
        assert!(parse_reply(&["ABC OK".to_string()]).is_err());
    }

    #[test]
    fn test_multibyte_garbage_is_protocol_error() {
        // A multi-byte character straddling the code or separator position
        // must parse as an error, never panic.
        assert!(parse_reply(&["25€abc".to_string()]).is_err());
        assert!(parse_reply(&["250€ abc".to_string()]).is_err());
        assert!(parse_reply(&["€50 abc".to_string()]).is_err());
    }
}
