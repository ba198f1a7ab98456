//! Classify HTTP statuses and transport errors into retry error kinds.

/// Statuses that are worth another attempt after a backoff.
pub const TRANSIENT_STATUSES: [u16; 5] = [408, 500, 502, 503, 504];

/// High-level classification of a failed attempt for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request/response cycle hit the HTTP timeout.
    Timeout,
    /// Network-level failure (refused, reset, DNS, closed mid-response).
    Connection,
    /// One of [`TRANSIENT_STATUSES`].
    TransientStatus(u16),
    /// Anything else; never retried.
    Other,
}

impl ErrorKind {
    /// True when a retry is warranted for this kind of failure.
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

/// Classify an HTTP status code. `200` and `202` are outcomes, not failures,
/// and are handled before this is consulted.
pub fn classify_http_status(code: u16) -> ErrorKind {
    if TRANSIENT_STATUSES.contains(&code) {
        ErrorKind::TransientStatus(code)
    } else {
        ErrorKind::Other
    }
}

/// Classify a reqwest transport error.
///
/// Request construction problems (bad URL, invalid header) are terminal.
/// Timeouts and anything that went wrong while talking to the peer are
/// transient.
pub fn classify_transport_error(e: &reqwest::Error) -> ErrorKind {
    if e.is_builder() {
        return ErrorKind::Other;
    }
    if e.is_timeout() {
        return ErrorKind::Timeout;
    }
    if e.is_connect() || e.is_request() {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}
