//! IMAP connection management.

mod client;
mod stream;

pub use client::{Authenticated, Client, MailboxInfo, NotAuthenticated, Selected};
pub use stream::{ImapStream, connect_plain, connect_tls};
