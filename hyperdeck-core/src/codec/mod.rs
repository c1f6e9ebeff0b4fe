//! Line framing for the deck protocol.
//!
//! `DeckCodec` decodes CRLF-terminated lines into [`Response`] values and
//! encodes [`Command`] values into command text. Wrapped in `FramedRead`,
//! the decoder is the engine's frame reader: a stream of responses that
//! ends on EOF or on the first framing error.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::command::Command;
use crate::error::DeckError;
use crate::response::Response;

/// Longest line accepted before the stream is declared corrupt.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Largest multi-line response accepted, counting line terminators.
pub const MAX_RESPONSE_LENGTH: usize = 1024 * 1024;

/// Header and body collected so far for a multi-line response.
#[derive(Debug)]
struct Partial {
    code: u32,
    lines: Vec<String>,
    size: usize,
}

#[derive(Debug, Default)]
pub struct DeckCodec {
    partial: Option<Partial>,
    /// Bytes of `src` already searched for a newline.
    scanned: usize,
}

impl DeckCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split off the next complete line, with trailing CR/LF removed.
    fn next_line(&mut self, src: &mut BytesMut) -> Result<Option<String>, DeckError> {
        let newline = src[self.scanned..].iter().position(|b| *b == b'\n');
        let Some(offset) = newline else {
            self.scanned = src.len();
            if src.len() > MAX_LINE_LENGTH {
                return Err(DeckError::LineTooLong {
                    size: src.len(),
                    max: MAX_LINE_LENGTH,
                });
            }
            return Ok(None);
        };

        let line = src.split_to(self.scanned + offset + 1);
        self.scanned = 0;

        let mut end = line.len();
        while end > 0 && matches!(line[end - 1], b'\r' | b'\n') {
            end -= 1;
        }
        Ok(Some(String::from_utf8_lossy(&line[..end]).into_owned()))
    }
}

impl Decoder for DeckCodec {
    type Item = Response;
    type Error = DeckError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = self.next_line(src)? {
            match self.partial.take() {
                None => {
                    // Stray blank lines between responses carry nothing.
                    if line.is_empty() {
                        continue;
                    }
                    let code = Response::parse_code(&line)?;
                    if line.ends_with(':') {
                        self.partial = Some(Partial {
                            code,
                            size: line.len() + 2,
                            lines: vec![line],
                        });
                    } else {
                        return Ok(Some(Response::new(code, vec![line])));
                    }
                }
                Some(partial) if line.is_empty() => {
                    return Ok(Some(Response::new(partial.code, partial.lines)));
                }
                Some(mut partial) => {
                    partial.size += line.len() + 2;
                    if partial.size > MAX_RESPONSE_LENGTH {
                        return Err(DeckError::ResponseTooLong {
                            size: partial.size,
                            max: MAX_RESPONSE_LENGTH,
                        });
                    }
                    partial.lines.push(line);
                    self.partial = Some(partial);
                }
            }
        }
        Ok(None)
    }
}

impl Encoder<Command> for DeckCodec {
    type Error = DeckError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let text = item.to_wire();
        dst.reserve(text.len() + 2);
        dst.extend_from_slice(text.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
