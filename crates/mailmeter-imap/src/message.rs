//! Lightweight RFC 822 message parsing.
//!
//! Extracts the `From` and `Subject` headers and a plain-text body from raw
//! fetched content. For multipart messages the body is the first `text/plain`
//! part found by a depth-first walk of the parts in declaration order, which
//! keeps part selection deterministic across messages. Base64 and
//! quoted-printable transfer encodings are decoded; decoding is lenient and
//! falls back to the raw text on malformed input.

use base64::Engine;

/// Headers and plain-text body extracted from one raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// `From` header, when present.
    pub from: Option<String>,
    /// `Subject` header, when present.
    pub subject: Option<String>,
    /// Plain-text body (empty when a multipart message has no text part).
    pub body: String,
}

/// Parses raw RFC 822 content.
#[must_use]
pub fn parse_message(raw: &[u8]) -> ParsedMessage {
    let text = String::from_utf8_lossy(raw);
    let (headers, body) = split_headers_body(&text);

    let body_text = if extract_boundary(&headers).is_some() {
        first_text_plain(&headers, &body).unwrap_or_default()
    } else {
        decode_transfer(&body, &headers)
    };

    ParsedMessage {
        from: header_value(&headers, "from"),
        subject: header_value(&headers, "subject"),
        body: body_text,
    }
}

/// Splits a message entity into headers and body at the first blank line.
fn split_headers_body(entity: &str) -> (String, String) {
    if let Some(idx) = entity.find("\r\n\r\n") {
        (entity[..idx].to_string(), entity[idx + 4..].to_string())
    } else if let Some(idx) = entity.find("\n\n") {
        (entity[..idx].to_string(), entity[idx + 2..].to_string())
    } else {
        (entity.to_string(), String::new())
    }
}

/// Looks up a header by case-insensitive name, unfolding continuation lines.
fn header_value(headers: &str, name: &str) -> Option<String> {
    let mut value: Option<String> = None;

    for line in headers.lines() {
        if let Some(current) = value.as_mut() {
            // Folded continuation lines start with whitespace.
            if line.starts_with(' ') || line.starts_with('\t') {
                current.push(' ');
                current.push_str(line.trim());
                continue;
            }
            break;
        }

        if let Some((header_name, rest)) = line.split_once(':')
            && header_name.trim().eq_ignore_ascii_case(name)
        {
            value = Some(rest.trim().to_string());
        }
    }

    value
}

/// Extracts the boundary parameter from the Content-Type header.
fn extract_boundary(headers: &str) -> Option<String> {
    let content_type = header_value(headers, "content-type")?;
    let lower = content_type.to_lowercase();
    let idx = lower.find("boundary=")?;
    let rest = &content_type[idx + 9..];

    if let Some(stripped) = rest.strip_prefix('"') {
        let end = stripped.find('"')?;
        Some(stripped[..end].to_string())
    } else {
        let end = rest
            .find(|c: char| c.is_whitespace() || c == ';')
            .unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }
}

/// Splits a multipart body into its parts, in declaration order.
fn split_multipart(body: &str, boundary: &str) -> Vec<String> {
    let delimiter = format!("--{boundary}");
    let end_delimiter = format!("--{boundary}--");

    let mut parts = Vec::new();
    for part in body.split(&delimiter) {
        let trimmed = part.trim_matches(|c| c == '\r' || c == '\n');

        // Skip the preamble and the closing "--" remnant.
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        let clean = trimmed.strip_suffix(&end_delimiter).unwrap_or(trimmed);
        if !clean.trim().is_empty() {
            parts.push(clean.to_string());
        }
    }
    parts
}

/// Depth-first, declaration-order walk returning the first text/plain part.
fn first_text_plain(headers: &str, body: &str) -> Option<String> {
    if let Some(boundary) = extract_boundary(headers) {
        for part in split_multipart(body, &boundary) {
            let (part_headers, part_body) = split_headers_body(&part);
            if let Some(text) = first_text_plain(&part_headers, &part_body) {
                return Some(text);
            }
        }
        return None;
    }

    let content_type = header_value(headers, "content-type")
        .unwrap_or_else(|| "text/plain".to_string())
        .to_lowercase();

    if content_type.contains("text/plain") {
        Some(decode_transfer(body, headers))
    } else {
        None
    }
}

/// Decodes a body according to its Content-Transfer-Encoding header.
fn decode_transfer(body: &str, headers: &str) -> String {
    let encoding = header_value(headers, "content-transfer-encoding")
        .unwrap_or_else(|| "7bit".to_string())
        .to_lowercase();

    match encoding.as_str() {
        "base64" => {
            let cleaned: String = body.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(&cleaned)
                .map_or_else(
                    |_| body.to_string(),
                    |bytes| String::from_utf8_lossy(&bytes).into_owned(),
                )
        }
        "quoted-printable" => decode_quoted_printable(body),
        _ => body.to_string(),
    }
}

/// Decodes quoted-printable text (RFC 2045), leniently.
///
/// Soft line breaks (`=` at end of line) are removed; invalid escape
/// sequences are kept as-is.
fn decode_quoted_printable(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'=' {
            if bytes[i + 1..].starts_with(b"\r\n") {
                i += 3;
                continue;
            }
            if bytes[i + 1..].starts_with(b"\n") {
                i += 2;
                continue;
            }
            if let Some(hex) = bytes.get(i + 1..i + 3)
                && let Ok(hex_str) = std::str::from_utf8(hex)
                && let Ok(byte) = u8::from_str_radix(hex_str, 16)
            {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
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
    fn test_single_part_message() {
        let raw = b"From: alice@example.com\r\nSubject: hi\r\n\r\nhello there\r\n";
        let msg = parse_message(raw);
        assert_eq!(msg.from.as_deref(), Some("alice@example.com"));
        assert_eq!(msg.subject.as_deref(), Some("hi"));
        assert_eq!(msg.body.trim_end(), "hello there");
    }

    #[test]
    fn test_missing_headers() {
        let raw = b"Date: today\r\n\r\nbody only\r\n";
        let msg = parse_message(raw);
        assert!(msg.from.is_none());
        assert!(msg.subject.is_none());
        assert_eq!(msg.body.trim_end(), "body only");
    }

    #[test]
    fn test_header_unfolding() {
        let headers = "Subject: a long\r\n folded subject\r\nFrom: x@y.z";
        assert_eq!(
            header_value(headers, "subject").unwrap(),
            "a long folded subject"
        );
    }

    #[test]
    fn test_multipart_picks_first_text_plain() {
        let raw = b"From: a@b.c\r\n\
Content-Type: multipart/alternative; boundary=\"xyz\"\r\n\r\n\
--xyz\r\nContent-Type: text/html\r\n\r\n<p>html</p>\r\n\
--xyz\r\nContent-Type: text/plain\r\n\r\nplain one\r\n\
--xyz\r\nContent-Type: text/plain\r\n\r\nplain two\r\n\
--xyz--\r\n";
        let msg = parse_message(raw);
        assert_eq!(msg.body.trim_end(), "plain one");
    }

    #[test]
    fn test_nested_multipart_depth_first() {
        let raw = b"Content-Type: multipart/mixed; boundary=outer\r\n\r\n\
--outer\r\nContent-Type: multipart/alternative; boundary=inner\r\n\r\n\
--inner\r\nContent-Type: text/plain\r\n\r\nnested text\r\n\
--inner--\r\n\
--outer\r\nContent-Type: text/plain\r\n\r\ntop-level text\r\n\
--outer--\r\n";
        let msg = parse_message(raw);
        assert_eq!(msg.body.trim_end(), "nested text");
    }

    #[test]
    fn test_multipart_without_text_part() {
        let raw = b"Content-Type: multipart/mixed; boundary=b1\r\n\r\n\
--b1\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n\
--b1--\r\n";
        let msg = parse_message(raw);
        assert!(msg.body.is_empty());
    }

    #[test]
    fn test_base64_body() {
        // base64("hello base64")
        let raw = b"Content-Transfer-Encoding: base64\r\n\r\naGVsbG8gYmFzZTY0\r\n";
        let msg = parse_message(raw);
        assert_eq!(msg.body, "hello base64");
    }

    #[test]
    fn test_quoted_printable_body() {
        let raw = b"Content-Transfer-Encoding: quoted-printable\r\n\r\ncaf=C3=A9 soft=\r\nbreak\r\n";
        let msg = parse_message(raw);
        assert_eq!(msg.body.trim_end(), "caf\u{e9} softbreak");
    }

    #[test]
    fn test_boundary_quoted_and_bare() {
        assert_eq!(
            extract_boundary("Content-Type: multipart/mixed; boundary=\"abc 123\""),
            Some("abc 123".to_string())
        );
        assert_eq!(
            extract_boundary("Content-Type: multipart/mixed; boundary=abc123; charset=utf-8"),
            Some("abc123".to_string())
        );
        assert_eq!(extract_boundary("Content-Type: text/plain"), None);
    }
}
