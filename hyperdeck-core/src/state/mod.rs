pub mod cache;
pub mod connection;
pub mod gate;

pub use cache::{Clip, StateCache, StatusMap};
pub use connection::ConnectionPhase;
pub use gate::CommandGate;
