//! # hyperdeck-core
//!
//! Client engine for the HyperDeck Ethernet control protocol: a
//! line-oriented text protocol on TCP port 9993.
//!
//! This crate contains:
//! - **Protocol types**: `Command`, `Response`, `NotifyFlags`
//! - **Codec**: `DeckCodec` for framed TCP I/O via `tokio_util`
//! - **Router**: classification of replies versus asynchronous notifications
//! - **State**: connection phase machine, single-command gate, clip/status cache
//! - **Events**: broadcast fan-out of cache changes and command transcripts
//! - **Deck**: the engine tying it together, with background polling
//! - **Error**: `DeckError`, a typed `thiserror`-based error

pub mod codec;
pub mod command;
pub mod config;
pub mod deck;
pub mod error;
pub mod event;
pub mod flags;
pub mod network;
pub mod response;
pub mod router;
pub mod state;
pub mod task;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{DeckCodec, MAX_LINE_LENGTH, MAX_RESPONSE_LENGTH};
pub use command::{Command, MAX_PLAY_SPEED};
pub use config::EngineConfig;
pub use deck::Deck;
pub use error::DeckError;
pub use event::{DeckEvent, EventBus, Subscription};
pub use flags::NotifyFlags;
pub use network::{ConnectionInfo, DEFAULT_PORT};
pub use response::{Response, codes};
pub use router::{Route, route};
pub use state::{Clip, CommandGate, ConnectionPhase, StateCache, StatusMap};
pub use task::SessionTasks;
