//! Completion notification dispatcher.
//!
//! Two independent channels announce a finished transfer: a desktop alert
//! and a one-shot TCP status push to a local companion listener. Neither
//! channel can fail the transfer it reports on; dispatch failures are
//! logged and swallowed, except that the push returns its own
//! [`TransferOutcome`] so its cost shows up in reports.

use crate::error::TransferFailure;
use crate::metrics::{Meter, TransferOutcome, steps};
use notify_rust::{Notification, Timeout};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Desktop alert display duration.
const ALERT_TIMEOUT_MS: u32 = 2000;

/// A desktop-alert sink.
///
/// Abstracted behind a trait so dispatch logic can be exercised without a
/// desktop session present.
pub trait Alert {
    /// Shows one alert.
    ///
    /// # Errors
    ///
    /// Returns a human-readable cause when the alert cannot be shown.
    fn alert(&self, title: &str, message: &str) -> Result<(), String>;
}

/// The real desktop notification sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopAlert;

impl Alert for DesktopAlert {
    fn alert(&self, title: &str, message: &str) -> Result<(), String> {
        Notification::new()
            .appname("mailmeter")
            .summary(title)
            .body(message)
            .timeout(Timeout::Milliseconds(ALERT_TIMEOUT_MS))
            .show()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Announces a transfer result on the desktop.
///
/// `context` names the operation for the alert text, e.g. `"Send"` or
/// `"Receive"`. A failing alert sink is logged and otherwise ignored.
pub fn notify(alert: &dyn Alert, succeeded: bool, context: &str) {
    let title = if succeeded {
        format!("{context} complete")
    } else {
        format!("{context} failed")
    };
    let message = if succeeded {
        "The transfer finished successfully."
    } else {
        "The transfer did not complete. See the log for details."
    };

    if let Err(cause) = alert.alert(&title, message) {
        warn!(%cause, "desktop alert could not be shown");
    }
}

/// Pushes one status line to a companion TCP listener.
///
/// Opens a connection, writes `status` as UTF-8, and closes. The push is
/// metered like any transfer; failures are classified as
/// [`FailureKind::Notification`](crate::FailureKind::Notification) and
/// never propagate.
pub async fn push_status(status: &str, host: &str, port: u16) -> TransferOutcome {
    let mut meter = Meter::start();
    match drive_push(status, host, port, &mut meter).await {
        Ok(()) => meter.success(),
        Err(failure) => {
            warn!(kind = %failure.kind, cause = %failure.cause, "status push failed");
            meter.failure(failure)
        }
    }
}

async fn drive_push(
    status: &str,
    host: &str,
    port: u16,
    meter: &mut Meter,
) -> Result<(), TransferFailure> {
    debug!(host, port, "pushing status to companion");
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| TransferFailure::notification(e.to_string()))?;
    meter.record(steps::push::CONNECT);

    stream
        .write_all(status.as_bytes())
        .await
        .map_err(|e| TransferFailure::notification(e.to_string()))?;
    stream
        .flush()
        .await
        .map_err(|e| TransferFailure::notification(e.to_string()))?;
    meter.record(steps::push::DATA);
    meter.set_payload_bytes(status.len() as u64);

    // Half-close signals end of status to the listener.
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "shutdown after status push failed");
    }
    meter.record(steps::push::CLOSE);

    Ok(())
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
    use crate::error::FailureKind;
    use std::sync::Mutex;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    /// Records alerts instead of showing them.
    #[derive(Default)]
    struct RecordingAlert {
        shown: Mutex<Vec<(String, String)>>,
    }

    impl Alert for RecordingAlert {
        fn alert(&self, title: &str, message: &str) -> Result<(), String> {
            self.shown
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            Ok(())
        }
    }

    /// Always fails to show.
    struct BrokenAlert;

    impl Alert for BrokenAlert {
        fn alert(&self, _title: &str, _message: &str) -> Result<(), String> {
            Err("no desktop session".to_string())
        }
    }

    #[test]
    fn test_notify_formats_success_and_failure() {
        let sink = RecordingAlert::default();
        notify(&sink, true, "Send");
        notify(&sink, false, "Receive");

        let shown = sink.shown.lock().unwrap();
        assert_eq!(shown[0].0, "Send complete");
        assert_eq!(shown[1].0, "Receive failed");
    }

    #[test]
    fn test_notify_swallows_sink_failure() {
        // Must not panic or propagate.
        notify(&BrokenAlert, true, "Send");
    }

    #[tokio::test]
    async fn test_push_status_delivers_and_meters() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let received = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = String::new();
            socket.read_to_string(&mut buf).await.unwrap();
            buf
        });

        let outcome = push_status("send ok", "127.0.0.1", port).await;

        assert!(outcome.succeeded());
        // connect 2/1, data 1/0, close 1/1
        assert_eq!(outcome.packets_sent, 4);
        assert_eq!(outcome.packets_received, 2);
        assert_eq!(outcome.payload_bytes, "send ok".len() as u64);
        assert_eq!(assert_ok!(received.await), "send ok");
    }

    #[tokio::test]
    async fn test_push_status_failure_is_notification_kind() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = push_status("send ok", "127.0.0.1", port).await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.failure.unwrap().kind, FailureKind::Notification);
        assert_eq!(outcome.packets_sent, 0);
        assert_eq!(outcome.payload_bytes, 0);
    }
}
