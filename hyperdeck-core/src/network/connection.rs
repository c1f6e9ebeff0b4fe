use std::fmt;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::info;

use crate::codec::DeckCodec;
use crate::error::DeckError;

/// Default HyperDeck control port.
pub const DEFAULT_PORT: u16 = 9993;

/// Stream of framed responses from the deck.
pub type ResponseReader = FramedRead<OwnedReadHalf, DeckCodec>;

/// Sink of commands to the deck.
pub type CommandWriter = FramedWrite<OwnedWriteHalf, DeckCodec>;

/// Where the deck lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Open a TCP connection to the deck and split it into a framed reader
/// and writer.
pub async fn open(
    info: &ConnectionInfo,
    connect_timeout: Duration,
) -> Result<(ResponseReader, CommandWriter), DeckError> {
    info!("connecting to {info}");
    let stream = tokio::time::timeout(
        connect_timeout,
        TcpStream::connect((info.host(), info.port())),
    )
    .await
    .map_err(|_| DeckError::Timeout(connect_timeout))??;
    stream.set_nodelay(true)?;
    info!("connection established");

    let (read_half, write_half) = stream.into_split();
    Ok((
        FramedRead::new(read_half, DeckCodec::new()),
        FramedWrite::new(write_half, DeckCodec::new()),
    ))
}
