//! Response model and response-code classification.
//!
//! # Wire format
//!
//! ```text
//! 200 ok\r\n                          single-line
//!
//! 208 transport info:\r\n             multi-line: header ends with ':'
//! status: stopped\r\n
//! speed: 0\r\n
//! \r\n                                blank line terminates the body
//! ```

use std::fmt;

use crate::error::DeckError;

// ── Codes ────────────────────────────────────────────────────────

/// Response codes the engine gives special meaning to.
pub mod codes {
    /// Generic success.
    pub const OK: u32 = 200;
    /// Slot information body.
    pub const SLOT_INFO: u32 = 202;
    /// Clip listing body.
    pub const CLIPS_INFO: u32 = 205;
    /// Transport / status body.
    pub const TRANSPORT_INFO: u32 = 208;
    /// Asynchronous: removable media changed.
    pub const SLOT_INFO_CHANGED: u32 = 502;
}

/// `true` for the error range `100..200`.
pub fn is_error_code(code: u32) -> bool {
    (100..200).contains(&code)
}

/// `true` for the asynchronous notification range `500..600`.
pub fn is_async_code(code: u32) -> bool {
    (500..600).contains(&code)
}

// ── Response ─────────────────────────────────────────────────────

/// One framed response from the deck.
///
/// `lines[0]` is the raw header line; any further lines are the body of a
/// multi-line response, without the blank terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    code: u32,
    lines: Vec<String>,
}

impl Response {
    /// Build a response from its header and body lines.
    pub fn new(code: u32, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Parse the leading whitespace-delimited token of a header line.
    pub fn parse_code(header: &str) -> Result<u32, DeckError> {
        header
            .split_whitespace()
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(|| DeckError::MalformedHeader(header.to_string()))
    }

    /// Parse a complete single-line response.
    pub fn from_header(header: impl Into<String>) -> Result<Self, DeckError> {
        let header = header.into();
        let code = Self::parse_code(&header)?;
        Ok(Self::new(code, vec![header]))
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn is_error(&self) -> bool {
        is_error_code(self.code)
    }

    pub fn is_async(&self) -> bool {
        is_async_code(self.code)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn header(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or_default()
    }

    /// Body lines of a multi-line response; empty for single-line ones.
    pub fn body(&self) -> &[String] {
        self.lines.get(1..).unwrap_or_default()
    }

    /// A header ending in `:` announces a body.
    pub fn is_multi_line(&self) -> bool {
        self.header().ends_with(':')
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Render the response the way a deck puts it on the wire.
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push_str("\r\n");
        }
        if self.is_multi_line() {
            out.push_str("\r\n");
        }
        out
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_ranges() {
        for code in 0..1000 {
            assert_eq!(is_error_code(code), (100..200).contains(&code));
            assert_eq!(is_async_code(code), (500..600).contains(&code));
        }
        assert!(is_error_code(100));
        assert!(!is_error_code(200));
        assert!(is_async_code(502));
        assert!(!is_async_code(600));
    }

    #[test]
    fn single_line_from_header() {
        let r = Response::from_header("200 ok").unwrap();
        assert_eq!(r.code(), 200);
        assert!(!r.is_error());
        assert!(!r.is_async());
        assert_eq!(r.lines(), ["200 ok"]);
        assert!(r.body().is_empty());
    }

    #[test]
    fn error_response_flags() {
        let r = Response::from_header("102 unsupported").unwrap();
        assert!(r.is_error());
        assert!(!r.is_async());
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(matches!(
            Response::parse_code("ok 200"),
            Err(DeckError::MalformedHeader(_))
        ));
        assert!(Response::parse_code("").is_err());
        assert!(Response::parse_code("-5 nope").is_err());
    }

    #[test]
    fn wire_rendering_of_multi_line() {
        let r = Response::new(
            208,
            vec![
                "208 transport info:".into(),
                "status: stopped".into(),
                "speed: 0".into(),
            ],
        );
        assert_eq!(
            r.to_wire(),
            "208 transport info:\r\nstatus: stopped\r\nspeed: 0\r\n\r\n"
        );
        assert_eq!(r.body(), ["status: stopped", "speed: 0"]);
        assert_eq!(r.to_string(), "208 transport info:");
    }
}
