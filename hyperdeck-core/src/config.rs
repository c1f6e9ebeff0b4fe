//! Engine tuning.

use std::time::Duration;

/// Timing and sizing knobs for a [`Deck`](crate::Deck).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Interval between background `transport info` refreshes.
    pub poll_interval: Duration,
    /// Wait after a media-change notification before re-reading clips.
    pub slot_settle_delay: Duration,
    /// Bound on one command's write + reply. `None` waits forever.
    pub command_timeout: Option<Duration>,
    /// Bound on opening the TCP connection.
    pub connect_timeout: Duration,
    /// Events buffered per subscriber before a slow one starts lagging.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            slot_settle_delay: Duration::from_millis(300),
            command_timeout: Some(Duration::from_secs(5)),
            connect_timeout: Duration::from_secs(5),
            event_capacity: 256,
        }
    }
}
