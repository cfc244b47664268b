//! SMTP connection management.

mod client;
mod stream;

pub use client::{Authenticated, Client, Connected};
pub use stream::{SmtpStream, connect, connect_tls};
