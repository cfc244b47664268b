//! # mailmeter-smtp
//!
//! A minimal SMTP submission client covering exactly what a single-message
//! transfer needs: connect (implicit TLS or STARTTLS), authenticate with
//! AUTH PLAIN, run one MAIL FROM / RCPT TO / DATA transaction, and QUIT.
//!
//! The client uses the type-state pattern so that only the operations valid
//! for the current protocol phase are available:
//!
//! ```text
//! Client<Connected> ── auth_plain() ──→ Client<Authenticated>
//!                                              │
//!                                        send_mail() (MAIL FROM → RCPT TO → DATA → body)
//! ```
//!
//! `quit()` is available from any state.
//!
//! ## Quick start
//!
//! ```ignore
//! use mailmeter_smtp::{Client, connection::connect_tls};
//!
//! let stream = connect_tls("mail.example.com", 465).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.ehlo("localhost").await?;
//! let client = client.auth_plain("user@example.com", "secret").await?;
//! let client = client
//!     .send_mail("user@example.com", "friend@example.com", payload.as_bytes())
//!     .await?;
//! client.quit().await?;
//! ```

#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;

pub use connection::{Authenticated, Client, Connected, SmtpStream};
pub use error::{Error, Result};
pub use parser::Reply;
