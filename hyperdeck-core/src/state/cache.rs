//! Local mirror of the deck's clip list and transport status.
//!
//! Both collections are published through `tokio::sync::watch` channels
//! holding `Arc` snapshots. A refresh builds the new collection off to the
//! side and swaps it in whole, so readers only ever see complete
//! snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::response::{Response, codes};

/// Device property name → value, as reported by the deck.
pub type StatusMap = HashMap<String, String>;

// ── Clip ─────────────────────────────────────────────────────────

/// One recorded clip. Its id is its position in the list plus one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    pub timecode: String,
    pub duration: String,
}

impl Clip {
    /// Parse `<index> <name tokens...> <timecode> <duration>`.
    ///
    /// Fields are split on single spaces so the name comes back exactly as
    /// the deck sent it.
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(' ').collect();
        if fields.len() < 3 {
            return None;
        }
        let (rest, tail) = fields.split_at(fields.len() - 2);
        Some(Self {
            name: rest[1..].join(" "),
            timecode: tail[0].to_string(),
            duration: tail[1].to_string(),
        })
    }
}

// ── Parsing ──────────────────────────────────────────────────────

/// Clips from a `205 clips info:` response.
///
/// The first body line is the deck's clip count; the real count is the
/// number of clip lines that follow.
pub fn parse_clip_list(response: &Response) -> Vec<Clip> {
    if response.code() != codes::CLIPS_INFO {
        return Vec::new();
    }
    response
        .body()
        .iter()
        .skip(1)
        .filter_map(|line| {
            let clip = Clip::parse(line);
            if clip.is_none() {
                debug!(%line, "skipping unparseable clip line");
            }
            clip
        })
        .collect()
}

/// `key: value` body lines of a response with the `expected` code.
///
/// Only the first `": "` separates key from value.
pub fn parse_properties(response: &Response, expected: u32) -> StatusMap {
    if response.code() != expected {
        return StatusMap::new();
    }
    response
        .body()
        .iter()
        .filter_map(|line| match line.split_once(": ") {
            Some((key, value)) => Some((key.to_string(), value.to_string())),
            None => {
                debug!(%line, "skipping property line without separator");
                None
            }
        })
        .collect()
}

// ── StateCache ───────────────────────────────────────────────────

#[derive(Debug)]
pub struct StateCache {
    clips: watch::Sender<Arc<Vec<Clip>>>,
    status: watch::Sender<Arc<StatusMap>>,
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCache {
    pub fn new() -> Self {
        let (clips, _) = watch::channel(Arc::new(Vec::new()));
        let (status, _) = watch::channel(Arc::new(StatusMap::new()));
        Self { clips, status }
    }

    /// Current clip snapshot.
    pub fn clips(&self) -> Arc<Vec<Clip>> {
        self.clips.borrow().clone()
    }

    /// Current status snapshot.
    pub fn status(&self) -> Arc<StatusMap> {
        self.status.borrow().clone()
    }

    pub fn watch_clips(&self) -> watch::Receiver<Arc<Vec<Clip>>> {
        self.clips.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<Arc<StatusMap>> {
        self.status.subscribe()
    }

    /// Swap in a new clip list and return the published snapshot.
    pub fn replace_clips(&self, clips: Vec<Clip>) -> Arc<Vec<Clip>> {
        let snapshot = Arc::new(clips);
        self.clips.send_replace(snapshot.clone());
        snapshot
    }

    /// Swap in a new status map and return the published snapshot.
    pub fn replace_status(&self, status: StatusMap) -> Arc<StatusMap> {
        let snapshot = Arc::new(status);
        self.status.send_replace(snapshot.clone());
        snapshot
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn response(lines: &[&str]) -> Response {
        let header = lines[0];
        Response::new(
            Response::parse_code(header).unwrap(),
            lines.iter().map(|l| l.to_string()).collect(),
        )
    }

    #[test]
    fn clip_name_keeps_inner_spaces() {
        let clip = Clip::parse("3 Interview  take two 01:00:00:00 00:02:30:12").unwrap();
        assert_eq!(clip.name, "Interview  take two");
        assert_eq!(clip.timecode, "01:00:00:00");
        assert_eq!(clip.duration, "00:02:30:12");
    }

    #[test]
    fn clip_without_name_tokens_has_empty_name() {
        let clip = Clip::parse("1 00:00:00:00 00:00:01:00").unwrap();
        assert_eq!(clip.name, "");
    }

    #[test]
    fn short_clip_line_is_rejected() {
        assert!(Clip::parse("1 00:00:00:00").is_none());
        assert!(Clip::parse("").is_none());
    }

    #[test]
    fn clip_list_ignores_stated_count() {
        let r = response(&[
            "205 clips info:",
            "clip count: 7",
            "1 Opening 00:00:00:00 00:00:10:00",
            "2 Main Feature 00:00:10:00 01:30:00:00",
        ]);
        let clips = parse_clip_list(&r);
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[1].name, "Main Feature");
    }

    #[test]
    fn clip_list_from_error_is_empty() {
        let r = response(&["105 no input"]);
        assert!(parse_clip_list(&r).is_empty());
    }

    #[test]
    fn properties_split_on_first_separator() {
        let r = response(&[
            "208 transport info:",
            "status: stopped",
            "speed: 0",
            "timecode: 00:00:01:00",
            "garbage",
        ]);
        let status = parse_properties(&r, codes::TRANSPORT_INFO);
        assert_eq!(status.len(), 3);
        assert_eq!(status["status"], "stopped");
        assert_eq!(status["speed"], "0");
        assert_eq!(status["timecode"], "00:00:01:00");
    }

    #[test]
    fn properties_with_wrong_code_are_empty() {
        let r = response(&["202 slot info:", "slot id: 1"]);
        assert!(parse_properties(&r, codes::TRANSPORT_INFO).is_empty());
        assert_eq!(parse_properties(&r, codes::SLOT_INFO)["slot id"], "1");
    }

    #[test]
    fn replace_swaps_whole_snapshots() {
        let cache = StateCache::new();
        let mut first = StatusMap::new();
        first.insert("status".into(), "play".into());
        first.insert("stale".into(), "yes".into());
        cache.replace_status(first);

        let before = cache.status();
        let mut second = StatusMap::new();
        second.insert("status".into(), "stopped".into());
        cache.replace_status(second);

        assert_eq!(before.len(), 2);
        let after = cache.status();
        assert_eq!(after.len(), 1);
        assert!(!after.contains_key("stale"));
    }

    #[test]
    fn watchers_see_replacements() {
        let cache = StateCache::new();
        let mut rx = cache.watch_clips();
        cache.replace_clips(vec![Clip::parse("1 A 00:00:00:00 00:00:01:00").unwrap()]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
