//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, connection
//! failures, transient HTTP statuses) and jittered exponential backoff so the
//! upsert loop has a single place that decides whether another attempt is
//! warranted and how long to wait before it.

mod classify;
mod policy;

pub use classify::{classify_http_status, classify_transport_error, ErrorKind, TRANSIENT_STATUSES};
pub use policy::{Backoff, RetryDecision, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
