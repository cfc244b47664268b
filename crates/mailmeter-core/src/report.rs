//! Performance report rendering.
//!
//! Collects labeled [`TransferOutcome`]s and renders them as a fixed-width
//! summary table. Failed operations render as a `FAILED` row so the report
//! shape stays the same whatever happened. A footer lists the capture
//! filters matching the report's endpoints for inspecting the same traffic
//! externally.

use crate::metrics::TransferOutcome;
use std::fmt::Write as _;

const RULE_WIDTH: usize = 75;

/// A summary report across one round of operations.
#[derive(Debug, Default)]
pub struct PerformanceReport {
    entries: Vec<(String, TransferOutcome)>,
    filter_ports: Vec<(String, u16)>,
}

impl PerformanceReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one labeled outcome, in display order.
    pub fn add(&mut self, label: impl Into<String>, outcome: TransferOutcome) {
        self.entries.push((label.into(), outcome));
    }

    /// Adds one labeled port for the capture-filter footer.
    pub fn add_filter_port(&mut self, label: impl Into<String>, port: u16) {
        self.filter_ports.push((label.into(), port));
    }

    /// Returns true if no outcomes were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the fixed-width summary table, with the capture-filter
    /// footer when filter ports were added.
    #[must_use]
    pub fn render(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let dashes = "-".repeat(RULE_WIDTH);

        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "PERFORMANCE SUMMARY");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(
            out,
            "{:<12} {:<9} {:<10} {:<10} {:<10} {:<12}",
            "Operation", "Time(s)", "Bytes", "Pkts Sent", "Pkts Recv", "Throughput"
        );
        let _ = writeln!(out, "{dashes}");

        for (label, outcome) in &self.entries {
            if outcome.succeeded() {
                let _ = writeln!(
                    out,
                    "{:<12} {:<9.3} {:<10} {:<10} {:<10} {:<12.2}",
                    label,
                    outcome.elapsed_secs(),
                    outcome.payload_bytes,
                    outcome.packets_sent,
                    outcome.packets_received,
                    outcome.throughput()
                );
            } else {
                let _ = writeln!(out, "{label:<12} FAILED");
            }
        }
        let _ = writeln!(out, "{rule}");

        if !self.filter_ports.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "CAPTURE FILTERS:");
            let _ = writeln!(out, "{dashes}");
            for (label, port) in &self.filter_ports {
                let _ = writeln!(out, "{:<13} tcp.port == {port}", format!("{label}:"));
            }
            let all = self
                .filter_ports
                .iter()
                .map(|(_, port)| format!("tcp.port == {port}"))
                .collect::<Vec<_>>()
                .join(" or ");
            let _ = writeln!(out, "{:<13} {all}", "All traffic:");
            let _ = writeln!(out, "{rule}");
        }

        out
    }
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
    use crate::error::TransferFailure;
    use std::time::Duration;

    fn success(payload_bytes: u64, secs: u64) -> TransferOutcome {
        TransferOutcome {
            elapsed: Duration::from_secs(secs),
            payload_bytes,
            packets_sent: 10,
            packets_received: 9,
            failure: None,
        }
    }

    #[test]
    fn test_render_success_rows() {
        let mut report = PerformanceReport::new();
        report.add("SMTP", success(1000, 2));
        report.add("IMAP", success(500, 1));

        let rendered = report.render();
        assert!(rendered.contains("PERFORMANCE SUMMARY"));
        assert!(rendered.contains("Operation"));
        assert!(rendered.contains("SMTP"));
        // 1000 bytes over 2 seconds.
        assert!(rendered.contains("500.00"));
        assert!(!rendered.contains("FAILED"));
    }

    #[test]
    fn test_render_failed_row() {
        let mut report = PerformanceReport::new();
        report.add(
            "SMTP",
            TransferOutcome {
                elapsed: Duration::from_millis(120),
                payload_bytes: 0,
                packets_sent: 2,
                packets_received: 1,
                failure: Some(TransferFailure::auth("535 rejected")),
            },
        );

        let rendered = report.render();
        assert!(rendered.contains("SMTP         FAILED"));
    }

    #[test]
    fn test_zero_elapsed_renders_zero_throughput() {
        let mut report = PerformanceReport::new();
        report.add("TCP", success(1000, 0));

        let rendered = report.render();
        assert!(rendered.contains("0.00"));
    }

    #[test]
    fn test_capture_filter_footer() {
        let mut report = PerformanceReport::new();
        report.add("SMTP", success(100, 1));
        report.add_filter_port("SMTP", 465);
        report.add_filter_port("IMAP", 993);
        report.add_filter_port("Notification", 9999);

        let rendered = report.render();
        assert!(rendered.contains("CAPTURE FILTERS:"));
        assert!(rendered.contains("SMTP:         tcp.port == 465"));
        assert!(rendered.contains(
            "All traffic:  tcp.port == 465 or tcp.port == 993 or tcp.port == 9999"
        ));
    }

    #[test]
    fn test_empty_report() {
        let report = PerformanceReport::new();
        assert!(report.is_empty());
        assert!(report.render().contains("PERFORMANCE SUMMARY"));
    }
}
