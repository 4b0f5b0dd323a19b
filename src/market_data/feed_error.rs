//! Terminal error reasons for a price-feed session.
//!
//! Every transport failure is folded into one of a fixed set of messages so
//! the dashboard can show something readable instead of a raw socket error.

use std::io;

use thiserror::Error;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError, UrlError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("Server not found")]
    ServerNotFound,

    #[error("Connection timed out")]
    Timeout,

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("Connection reset")]
    ConnectionReset,

    #[error("Connection closed by server")]
    Closed,

    #[error("Network error: {0}")]
    Network(String),
}

impl From<WsError> for FeedError {
    fn from(err: WsError) -> Self {
        classify_ws_error(&err)
    }
}

impl From<io::Error> for FeedError {
    fn from(err: io::Error) -> Self {
        classify_io_error(&err)
    }
}

/// Map a tungstenite error onto a [`FeedError`].
pub fn classify_ws_error(err: &WsError) -> FeedError {
    match err {
        WsError::Io(io_err) => classify_io_error(io_err),
        WsError::ConnectionClosed | WsError::AlreadyClosed => FeedError::Closed,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => FeedError::ConnectionReset,
        WsError::Url(UrlError::NoHostName | UrlError::EmptyHostName) => FeedError::ServerNotFound,
        WsError::Url(UrlError::UnableToConnect(detail)) => classify_message(detail)
            .unwrap_or_else(|| FeedError::Network(detail.clone())),
        WsError::Http(response) => {
            FeedError::Network(format!("handshake rejected with HTTP {}", response.status()))
        }
        other => {
            let detail = other.to_string();
            classify_message(&detail).unwrap_or(FeedError::Network(detail))
        }
    }
}

/// Map an I/O error onto a [`FeedError`].
pub fn classify_io_error(err: &io::Error) -> FeedError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FeedError::Timeout,
        io::ErrorKind::ConnectionRefused => FeedError::ConnectionRefused,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => FeedError::ConnectionReset,
        io::ErrorKind::NotFound | io::ErrorKind::AddrNotAvailable => FeedError::ServerNotFound,
        _ => {
            let detail = err.to_string();
            classify_message(&detail).unwrap_or(FeedError::Network(detail))
        }
    }
}

/// Resolver failures surface as uncategorised I/O errors, so the message text
/// is the only signal left.
fn classify_message(detail: &str) -> Option<FeedError> {
    let lower = detail.to_ascii_lowercase();
    const DNS_MARKERS: &[&str] = &[
        "failed to lookup address",
        "name or service not known",
        "nodename nor servname",
        "no such host",
        "temporary failure in name resolution",
        "dns error",
    ];
    if DNS_MARKERS.iter().any(|m| lower.contains(m)) {
        Some(FeedError::ServerNotFound)
    } else if lower.contains("timed out") {
        Some(FeedError::Timeout)
    } else if lower.contains("connection refused") {
        Some(FeedError::ConnectionRefused)
    } else if lower.contains("connection reset") {
        Some(FeedError::ConnectionReset)
    } else {
        None
    }
}
