//! Connection lifecycle state machine.
//!
//! Transitions are validated and return `Result` instead of panicking.

use std::time::Instant;

use crate::error::DeckError;

// ── ConnectionPhase ──────────────────────────────────────────────

/// The current phase of the engine's connection to the deck.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected ──► Closed
///       ▲                │             │            │
///       └────────────────┘             │            │
///                    ▲                 │            │
///                    └──── reconfigure ┴────────────┘
/// ```
///
/// `Closed` is terminal for one transport; reconfiguring starts a new
/// transport from `Connecting`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// Never connected, or the last connect attempt failed.
    #[default]
    Disconnected,

    /// TCP connection being opened.
    Connecting,

    /// Transport is up and the background tasks are running.
    Connected {
        /// When the connection entered the `Connected` state.
        since: Instant,
    },

    /// The transport was torn down or died.
    Closed,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

impl ConnectionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// How long the connection has been in the `Connected` state.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`, `Closed`.
    pub fn begin_connect(&mut self) -> Result<(), DeckError> {
        match self {
            Self::Disconnected | Self::Closed => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(DeckError::InvalidTransition(
                "cannot connect: a transport is already open or opening",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn complete_connect(&mut self) -> Result<(), DeckError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(DeckError::InvalidTransition(
                "cannot complete connect: not in Connecting state",
            )),
        }
    }

    /// Transition back to `Disconnected` after a failed connect.
    ///
    /// Valid from: `Connecting`.
    pub fn fail_connect(&mut self) -> Result<(), DeckError> {
        match self {
            Self::Connecting => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(DeckError::InvalidTransition(
                "cannot fail connect: not in Connecting state",
            )),
        }
    }

    /// Mark the transport as gone. Idempotent from any phase but
    /// `Disconnected`, which has no transport to close.
    pub fn close(&mut self) {
        if !matches!(self, Self::Disconnected) {
            *self = Self::Closed;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
