//! State-change events published to subscribers.
//!
//! Any number of subscribers may register; each gets its own
//! [`Subscription`] handle and unsubscribes by dropping it.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

/// Something observers of the deck may want to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeckEvent {
    /// The clip cache was replaced; read it through `Deck::clips`.
    ClipsChanged,
    /// The status cache was replaced; read it through `Deck::status`.
    StatusChanged,
    /// One command round-trip: the lines written and the lines received.
    Transcript {
        sent: Vec<String>,
        received: Vec<String>,
    },
    /// The session died; no further replies will arrive on it.
    ConnectionLost { reason: String },
}

// ── EventBus ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DeckEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Deliver `event` to every live subscriber. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, event: DeckEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ── Subscription ─────────────────────────────────────────────────

/// Receiving end of an [`EventBus`].
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<DeckEvent>,
}

impl Subscription {
    /// Next event, or `None` once the bus is gone.
    ///
    /// A subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<DeckEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "subscriber lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<DeckEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "subscriber lagged; events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}
