//! Per-record delivery outcome.

use thiserror::Error;

/// Why a record was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The record could not be turned into a request body.
    #[error("encode payload: {0}")]
    Encode(String),
    /// A transport error that retrying will not fix.
    #[error("transport: {0}")]
    Transport(String),
    /// A non-success HTTP status, with the start of the response body.
    #[error("upsert failed: {body} ({code})")]
    Status { code: u16, body: String },
    /// Every attempt hit a transient failure; `last` is the final one.
    #[error("exhausted retries after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<FailureReason>,
    },
    /// The batch was cancelled or its deadline passed.
    #[error("cancelled")]
    Cancelled,
}

impl FailureReason {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FailureReason::Cancelled)
    }

    /// HTTP status behind this failure, looking through `RetriesExhausted`.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FailureReason::Status { code, .. } => Some(*code),
            FailureReason::RetriesExhausted { last, .. } => last.status_code(),
            _ => None,
        }
    }
}

/// Terminal result of delivering one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted and applied (HTTP 200).
    Sent,
    /// Accepted but not applied because it matched a suppression rule (HTTP 202).
    Suppressed,
    Failed(FailureReason),
}

impl DeliveryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Sent => "sent",
            DeliveryOutcome::Suppressed => "suppressed",
            DeliveryOutcome::Failed(_) => "failed",
        }
    }
}

/// Outcome plus the number of requests actually issued for the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcome: DeliveryOutcome,
    pub attempts: u32,
}

impl DeliveryReport {
    pub(crate) fn new(outcome: DeliveryOutcome, attempts: u32) -> Self {
        Self { outcome, attempts }
    }

    pub(crate) fn failed(reason: FailureReason, attempts: u32) -> Self {
        Self::new(DeliveryOutcome::Failed(reason), attempts)
    }

    /// A record that never got to its first attempt.
    pub(crate) fn abandoned() -> Self {
        Self::failed(FailureReason::Cancelled, 0)
    }
}
