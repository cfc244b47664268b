//! Transfer metrics model.
//!
//! Packet counts are a derived, illustrative accounting, not a capture of
//! actual network frames: each protocol step contributes a fixed increment
//! representing the transport segments that step typically produces. The
//! increments live in the [`steps`] constant tables so their synthetic
//! nature stays visible and testable.

use crate::error::TransferFailure;
use std::time::{Duration, Instant};

/// Fixed sent/received segment estimate for one protocol step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCost {
    /// Estimated segments sent.
    pub sent: u32,
    /// Estimated segments received.
    pub received: u32,
}

impl StepCost {
    /// Creates a step cost.
    #[must_use]
    pub const fn new(sent: u32, received: u32) -> Self {
        Self { sent, received }
    }
}

/// Per-step increment tables, one module per protocol.
pub mod steps {
    use super::StepCost;

    /// SMTP submission steps.
    pub mod smtp {
        use super::StepCost;

        /// Connection establishment (TCP open plus greeting/EHLO exchange).
        pub const CONNECT: StepCost = StepCost::new(2, 1);
        /// AUTH command and credential exchange.
        pub const AUTH: StepCost = StepCost::new(2, 2);
        /// MAIL FROM, RCPT TO, DATA, and message payload.
        pub const ENVELOPE: StepCost = StepCost::new(4, 4);
        /// QUIT and connection teardown.
        pub const CLOSE: StepCost = StepCost::new(2, 2);
    }

    /// IMAP retrieval steps.
    pub mod imap {
        use super::StepCost;

        /// Connection establishment and greeting.
        pub const CONNECT: StepCost = StepCost::new(2, 1);
        /// LOGIN exchange.
        pub const LOGIN: StepCost = StepCost::new(1, 1);
        /// SELECT exchange.
        pub const SELECT: StepCost = StepCost::new(1, 1);
        /// SEARCH exchange.
        pub const SEARCH: StepCost = StepCost::new(1, 1);
        /// FETCH exchange; responses may span multiple segments for larger
        /// messages, reflected as a fixed +2 receive estimate.
        pub const FETCH: StepCost = StepCost::new(1, 2);
        /// LOGOUT and connection teardown.
        pub const CLOSE: StepCost = StepCost::new(2, 2);
    }

    /// Companion status push steps.
    pub mod push {
        use super::StepCost;

        /// TCP connection establishment.
        pub const CONNECT: StepCost = StepCost::new(2, 1);
        /// The single status write.
        pub const DATA: StepCost = StepCost::new(1, 0);
        /// Connection teardown.
        pub const CLOSE: StepCost = StepCost::new(1, 1);
    }
}

/// The outcome record every engine call produces.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    /// Wall-clock time from the first action to the last, failures included.
    pub elapsed: Duration,
    /// Application payload bytes transferred.
    pub payload_bytes: u64,
    /// Estimated transport segments sent.
    pub packets_sent: u32,
    /// Estimated transport segments received.
    pub packets_received: u32,
    /// The failure that ended the transfer, if any.
    pub failure: Option<TransferFailure>,
}

impl TransferOutcome {
    /// Returns true if the transfer completed successfully.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// Elapsed time in seconds.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Throughput in bytes per second, or 0 when no time elapsed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed_secs();
        if secs > 0.0 {
            self.payload_bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Accumulates metrics over one transfer and seals them into an outcome.
///
/// Started at the first action of a transfer; each completed protocol step
/// records its fixed cost. Sealing captures the wall-clock delta, so failed
/// transfers report their elapsed time and partial counters too.
#[derive(Debug)]
pub struct Meter {
    started: Instant,
    payload_bytes: u64,
    packets_sent: u32,
    packets_received: u32,
}

impl Meter {
    /// Starts the clock.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            payload_bytes: 0,
            packets_sent: 0,
            packets_received: 0,
        }
    }

    /// Records one completed protocol step.
    pub const fn record(&mut self, step: StepCost) {
        self.packets_sent += step.sent;
        self.packets_received += step.received;
    }

    /// Sets the payload byte count.
    pub const fn set_payload_bytes(&mut self, bytes: u64) {
        self.payload_bytes = bytes;
    }

    /// Seals the meter into a successful outcome.
    #[must_use]
    pub fn success(self) -> TransferOutcome {
        self.seal(None)
    }

    /// Seals the meter into a failed outcome.
    #[must_use]
    pub fn failure(self, failure: TransferFailure) -> TransferOutcome {
        self.seal(Some(failure))
    }

    fn seal(self, failure: Option<TransferFailure>) -> TransferOutcome {
        TransferOutcome {
            elapsed: self.started.elapsed(),
            payload_bytes: self.payload_bytes,
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
            failure,
        }
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

    #[test]
    fn test_smtp_step_table_totals() {
        // The documented success totals for a full send.
        let total_sent = steps::smtp::CONNECT.sent
            + steps::smtp::AUTH.sent
            + steps::smtp::ENVELOPE.sent
            + steps::smtp::CLOSE.sent;
        let total_received = steps::smtp::CONNECT.received
            + steps::smtp::AUTH.received
            + steps::smtp::ENVELOPE.received
            + steps::smtp::CLOSE.received;
        assert_eq!(total_sent, 10);
        assert_eq!(total_received, 9);
    }

    #[test]
    fn test_meter_accumulates_steps() {
        let mut meter = Meter::start();
        meter.record(steps::imap::CONNECT);
        meter.record(steps::imap::LOGIN);
        meter.set_payload_bytes(42);

        let outcome = meter.success();
        assert!(outcome.succeeded());
        assert_eq!(outcome.packets_sent, 3);
        assert_eq!(outcome.packets_received, 2);
        assert_eq!(outcome.payload_bytes, 42);
        assert!(outcome.elapsed_secs() >= 0.0);
    }

    #[test]
    fn test_failed_meter_keeps_partial_counters() {
        let mut meter = Meter::start();
        meter.record(steps::smtp::CONNECT);

        let outcome = meter.failure(TransferFailure::auth("535 rejected"));
        assert!(!outcome.succeeded());
        assert_eq!(outcome.packets_sent, 2);
        assert_eq!(outcome.packets_received, 1);
        assert_eq!(outcome.payload_bytes, 0);
    }

    #[test]
    fn test_throughput_zero_when_no_time_elapsed() {
        let outcome = TransferOutcome {
            elapsed: Duration::ZERO,
            payload_bytes: 1000,
            packets_sent: 0,
            packets_received: 0,
            failure: None,
        };
        assert!((outcome.throughput() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_throughput_computation() {
        let outcome = TransferOutcome {
            elapsed: Duration::from_secs(2),
            payload_bytes: 1000,
            packets_sent: 10,
            packets_received: 9,
            failure: None,
        };
        assert!((outcome.throughput() - 500.0).abs() < f64::EPSILON);
    }
}
