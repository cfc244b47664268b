//! Transfer engines and the notification dispatcher.

mod notify;
mod receive;
mod send;

pub use notify::{Alert, DesktopAlert, notify, push_status};
pub use receive::{BODY_EXCERPT_LIMIT, MessageSummary, receive_latest};
pub use send::{OutgoingMessage, send_message};
