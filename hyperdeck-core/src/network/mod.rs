pub mod connection;

pub use connection::{CommandWriter, ConnectionInfo, DEFAULT_PORT, ResponseReader, open};
