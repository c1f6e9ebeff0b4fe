//! Domain-specific error types for the deck control engine.
//!
//! All fallible operations return `Result<T, DeckError>`.
//! Device input never panics; every failure is typed.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the deck control engine.
#[derive(Debug, Error)]
pub enum DeckError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A response header did not start with a numeric code.
    #[error("malformed response header: {0:?}")]
    MalformedHeader(String),

    /// A single line exceeded the codec limit without a terminator.
    #[error("line too long: {size} bytes (max {max})")]
    LineTooLong { size: usize, max: usize },

    /// A multi-line response grew past the codec limit without its blank
    /// terminator.
    #[error("response too long: {size} bytes (max {max})")]
    ResponseTooLong { size: usize, max: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// No transport is established; the command was not sent.
    #[error("not connected")]
    NotConnected,

    /// The transport died while a command was waiting for its reply.
    #[error("connection lost before a reply arrived")]
    ConnectionLost,

    /// A channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A lifecycle transition was requested from the wrong phase.
    #[error("invalid connection transition: {0}")]
    InvalidTransition(&'static str),

    // ── Application Errors ───────────────────────────────────────
    /// A command argument would break command framing on the wire.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl DeckError {
    /// Returns `true` for errors after which the session cannot carry
    /// further commands.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ConnectionLost
                | Self::ChannelClosed
                | Self::Connection(_)
                | Self::MalformedHeader(_)
                | Self::LineTooLong { .. }
                | Self::ResponseTooLong { .. }
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for DeckError {
    fn from(s: String) -> Self {
        DeckError::Other(s)
    }
}

impl From<&str> for DeckError {
    fn from(s: &str) -> Self {
        DeckError::Other(s.to_string())
    }
}

impl From<futures::channel::mpsc::SendError> for DeckError {
    fn from(_: futures::channel::mpsc::SendError) -> Self {
        DeckError::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for DeckError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        DeckError::ConnectionLost
    }
}
