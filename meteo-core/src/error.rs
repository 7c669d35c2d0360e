//! Error taxonomy of the network client.
//!
//! [`NetworkError`] is the closed set of failures a caller ever sees from the
//! executor or a provider adapter. Lower-level [`TransportError`]s are
//! classified by [`TransportErrorKind`] and normalized before they leave the
//! executor.

use std::fmt;

use thiserror::Error;

/// Terminal failure of one logical request.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Invalid URL")]
    InvalidTarget,

    #[error("Invalid server response")]
    InvalidResponse,

    #[error("Server error (code: {0})")]
    HttpError(u16),

    #[error("Failed to parse response: {0}")]
    DecodingError(String),

    #[error("No data received")]
    NoData,

    #[error("Request timed out")]
    Timeout,

    #[error("Network unavailable")]
    NetworkUnavailable,
}

impl NetworkError {
    /// Short machine-friendly tag, handy for logs and JSON output.
    pub fn tag(&self) -> &'static str {
        match self {
            NetworkError::InvalidTarget => "invalid_target",
            NetworkError::InvalidResponse => "invalid_response",
            NetworkError::HttpError(_) => "http_error",
            NetworkError::DecodingError(_) => "decoding_error",
            NetworkError::NoData => "no_data",
            NetworkError::Timeout => "timeout",
            NetworkError::NetworkUnavailable => "network_unavailable",
        }
    }
}

// Decoding errors compare on their message text only.
impl PartialEq for NetworkError {
    fn eq(&self, other: &Self) -> bool {
        use NetworkError::*;

        match (self, other) {
            (InvalidTarget, InvalidTarget)
            | (InvalidResponse, InvalidResponse)
            | (NoData, NoData)
            | (Timeout, Timeout)
            | (NetworkUnavailable, NetworkUnavailable) => true,
            (HttpError(a), HttpError(b)) => a == b,
            (DecodingError(a), DecodingError(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for NetworkError {}

/// Classification of a failed transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    NotConnected,
    ConnectionLost,
    ConnectionReset,
    TimedOut,
    CannotConnectToHost,
    CannotFindHost,
    DnsLookupFailed,
    BadServerResponse,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::NotConnected => "not-connected",
            TransportErrorKind::ConnectionLost => "connection-lost",
            TransportErrorKind::ConnectionReset => "connection-reset",
            TransportErrorKind::TimedOut => "timed-out",
            TransportErrorKind::CannotConnectToHost => "cannot-connect-host",
            TransportErrorKind::CannotFindHost => "cannot-find-host",
            TransportErrorKind::DnsLookupFailed => "dns-lookup-failed",
            TransportErrorKind::BadServerResponse => "bad-server-response",
            TransportErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl From<TransportErrorKind> for NetworkError {
    fn from(kind: TransportErrorKind) -> Self {
        match kind {
            TransportErrorKind::TimedOut => NetworkError::Timeout,
            TransportErrorKind::NotConnected
            | TransportErrorKind::ConnectionLost
            | TransportErrorKind::ConnectionReset
            | TransportErrorKind::CannotConnectToHost
            | TransportErrorKind::CannotFindHost
            | TransportErrorKind::DnsLookupFailed => NetworkError::NetworkUnavailable,
            TransportErrorKind::BadServerResponse | TransportErrorKind::Other => {
                NetworkError::InvalidResponse
            }
        }
    }
}

impl From<&TransportError> for NetworkError {
    fn from(err: &TransportError) -> Self {
        err.kind.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_are_stable() {
        assert_eq!(NetworkError::InvalidTarget.to_string(), "Invalid URL");
        assert_eq!(NetworkError::InvalidResponse.to_string(), "Invalid server response");
        assert_eq!(NetworkError::HttpError(404).to_string(), "Server error (code: 404)");
        assert!(
            NetworkError::DecodingError("missing field `current`".into())
                .to_string()
                .starts_with("Failed to parse response:")
        );
        assert_eq!(NetworkError::NoData.to_string(), "No data received");
        assert_eq!(NetworkError::Timeout.to_string(), "Request timed out");
        assert_eq!(NetworkError::NetworkUnavailable.to_string(), "Network unavailable");
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(NetworkError::InvalidTarget, NetworkError::InvalidTarget);
        assert_eq!(NetworkError::HttpError(500), NetworkError::HttpError(500));
        assert_ne!(NetworkError::HttpError(404), NetworkError::HttpError(500));
        assert_ne!(NetworkError::InvalidTarget, NetworkError::InvalidResponse);
        assert_eq!(
            NetworkError::DecodingError("bad".into()),
            NetworkError::DecodingError("bad".into())
        );
        assert_ne!(
            NetworkError::DecodingError("bad".into()),
            NetworkError::DecodingError("worse".into())
        );
    }

    #[test]
    fn transport_kinds_map_into_taxonomy() {
        assert_eq!(NetworkError::from(TransportErrorKind::TimedOut), NetworkError::Timeout);

        for kind in [
            TransportErrorKind::NotConnected,
            TransportErrorKind::ConnectionLost,
            TransportErrorKind::ConnectionReset,
            TransportErrorKind::CannotConnectToHost,
            TransportErrorKind::CannotFindHost,
            TransportErrorKind::DnsLookupFailed,
        ] {
            assert_eq!(NetworkError::from(kind), NetworkError::NetworkUnavailable, "{kind}");
        }

        assert_eq!(NetworkError::from(TransportErrorKind::Other), NetworkError::InvalidResponse);
        assert_eq!(
            NetworkError::from(TransportErrorKind::BadServerResponse),
            NetworkError::InvalidResponse
        );
    }
}
