//! Routing of framed responses.
//!
//! Replies and unsolicited notifications arrive interleaved on one socket.
//! [`route`] decides what the reader does with each response; the reader
//! then applies the decision (see `Deck`'s read loop).

use crate::response::{Response, codes};

/// What to do with one response from the frame reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A reply: resolves the pending command, if any.
    Reply,
    /// Removable media changed; the clip list must be re-read once the
    /// deck has settled.
    MediaChanged,
    /// Any other unsolicited notification. No cache action.
    Notification(u32),
}

/// Asynchronous responses never resolve a pending command.
pub fn route(response: &Response) -> Route {
    if !response.is_async() {
        return Route::Reply;
    }
    match response.code() {
        codes::SLOT_INFO_CHANGED => Route::MediaChanged,
        code => Route::Notification(code),
    }
}
