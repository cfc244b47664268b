//! End-to-end demo: send one message, fetch the newest message back, push a
//! status line to a local companion listener, and print the performance
//! summary.
//!
//! Configuration comes from the environment:
//!
//! ```text
//! MAILMETER_HOST=mail.example.com \
//! MAILMETER_ADDRESS=user@example.com \
//! MAILMETER_SECRET=app-password \
//! MAILMETER_RECIPIENT=friend@example.com \
//! cargo run --example transfer
//! ```
//!
//! The companion listener defaults to 127.0.0.1:9999; start one with
//! `nc -l 9999` to see the status pushes arrive.

use mailmeter_core::{
    Credentials, DesktopAlert, OutgoingMessage, PerformanceReport, ServerEndpoint, notify,
    push_status, receive_latest, send_message, validate_credentials,
};

const COMPANION_HOST: &str = "127.0.0.1";
const COMPANION_PORT: u16 = 9999;

fn env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let host = env("MAILMETER_HOST");
    let credentials = Credentials::new(env("MAILMETER_ADDRESS"), env("MAILMETER_SECRET"));
    if let Err(e) = validate_credentials(&credentials) {
        eprintln!("invalid credentials: {e}");
        std::process::exit(1);
    }

    let submission = ServerEndpoint::submission(host.clone());
    let store = ServerEndpoint::store(host);
    let alert = DesktopAlert;

    let message = OutgoingMessage::new(
        credentials.address.clone(),
        env("MAILMETER_RECIPIENT"),
        "mailmeter test message",
        "Hello from mailmeter.",
    );

    let send_outcome = send_message(&credentials, &submission, &message).await;
    notify(&alert, send_outcome.succeeded(), "Send");
    let send_push = push_status(
        if send_outcome.succeeded() {
            "send ok"
        } else {
            "send failed"
        },
        COMPANION_HOST,
        COMPANION_PORT,
    )
    .await;

    let (receive_outcome, summary) = receive_latest(&credentials, &store).await;
    notify(&alert, receive_outcome.succeeded(), "Receive");

    if let Some(summary) = summary {
        println!("From:    {}", summary.from);
        println!("Subject: {}", summary.subject);
        println!("Body:    {}", summary.body_excerpt);
    } else if receive_outcome.succeeded() {
        println!("Mailbox is empty.");
    }

    let mut report = PerformanceReport::new();
    report.add("SMTP", send_outcome);
    report.add("IMAP", receive_outcome);
    report.add("TCP", send_push);
    report.add_filter_port("SMTP", submission.port);
    report.add_filter_port("IMAP", store.port);
    report.add_filter_port("Notification", COMPANION_PORT);

    print!("{}", report.render());
}
