//! # mailmeter-core
//!
//! Instrumented email transfer engines. This crate provides:
//!
//! - An SMTP send engine and an IMAP receive engine, each driving one
//!   complete protocol session and reporting a [`TransferOutcome`] instead
//!   of raising errors
//! - The metrics model: wall-clock elapsed time, payload bytes, and a
//!   per-step estimated packet accounting
//! - A notification dispatcher: desktop alerts plus a TCP status push to a
//!   companion listener, itself measured
//! - Performance report rendering across the three operation kinds
//!
//! Engines are plain async functions with no shared state; front ends run
//! each call on its own worker task and inspect the returned outcome.

#![forbid(unsafe_code)]

pub mod account;
mod error;
pub mod metrics;
pub mod report;
pub mod service;

pub use account::{
    Credentials, DEFAULT_STORE_PORT, DEFAULT_SUBMISSION_PORT, Security, ServerEndpoint,
    ValidationError, validate_credentials, validate_recipient,
};
pub use error::{FailureKind, TransferFailure};
pub use metrics::{Meter, StepCost, TransferOutcome, steps};
pub use report::PerformanceReport;
pub use service::{
    Alert, BODY_EXCERPT_LIMIT, DesktopAlert, MessageSummary, OutgoingMessage, notify,
    push_status, receive_latest, send_message,
};
