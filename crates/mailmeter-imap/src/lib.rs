//! # mailmeter-imap
//!
//! A minimal IMAP retrieval client covering exactly what "select the inbox
//! and fetch the newest message" needs: LOGIN, SELECT, SEARCH ALL, FETCH of
//! the full message content, and LOGOUT.
//!
//! The client uses the type-state pattern to enforce valid IMAP state
//! transitions at compile time:
//!
//! ```text
//! Client<NotAuthenticated> ── login() ──→ Client<Authenticated>
//!                                               │
//!                                           select()
//!                                               ↓
//!                                       Client<Selected> ── search_all() / fetch_raw()
//! ```
//!
//! `logout()` is available from any state and is best-effort.
//!
//! Raw fetched content is decoded with the lightweight RFC 822 parser in
//! [`message`], which extracts `From`, `Subject`, and the first plain-text
//! body part.

#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod message;

pub use connection::{
    Authenticated, Client, ImapStream, MailboxInfo, NotAuthenticated, Selected,
};
pub use error::{Error, Result};
pub use message::{ParsedMessage, parse_message};
