//! Outbound protocol commands.
//!
//! Every command renders to the exact text the deck expects. Multi-line
//! commands use the same framing as multi-line responses: a header ending
//! in `:`, one `key: value` line per parameter, and a blank line.

use std::fmt;

use crate::error::DeckError;
use crate::flags::NotifyFlags;

/// Fastest shuttle speed the deck accepts, as a multiplier.
pub const MAX_PLAY_SPEED: f64 = 16.0;

/// All commands the engine knows how to issue.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ── Session ──────────────────────────────────────────────────
    /// No-op liveness probe.
    Ping,
    /// Subscribe to the deck's change notifications.
    Notify(NotifyFlags),

    // ── Transport ────────────────────────────────────────────────
    /// Start recording with a deck-chosen clip name.
    Record,
    /// Start recording into a named clip.
    RecordNamed(String),
    /// Stop playback or recording.
    Stop,
    /// Start playback. `speed` is a percentage in `-1600..=1600`.
    Play { single: bool, looped: bool, speed: i32 },
    /// Jog to an absolute timecode.
    Jog(String),
    /// Query transport state.
    TransportInfo,

    // ── Clips ────────────────────────────────────────────────────
    /// Select a clip by its 1-based id.
    GotoClip(u32),
    /// Move relative to the current clip.
    GotoClipOffset(i64),
    /// List the clips on the active media.
    ClipsGet,

    // ── Slots ────────────────────────────────────────────────────
    /// Make a media slot active.
    SlotSelect(u32),
    /// Query a slot, or the active one when `None`.
    SlotInfo(Option<u32>),

    /// Verbatim command text for anything not modelled above.
    Raw(String),
}

impl Command {
    /// Playback command from a speed multiplier.
    ///
    /// The multiplier is clamped to `±MAX_PLAY_SPEED` and truncated to an
    /// integer percentage.
    pub fn play(single: bool, looped: bool, speed: f64) -> Self {
        let percent = (speed * 100.0).clamp(-MAX_PLAY_SPEED * 100.0, MAX_PLAY_SPEED * 100.0);
        Command::Play {
            single,
            looped,
            speed: percent as i32,
        }
    }

    /// Clip selection from a 0-based index; negative input selects clip 1.
    pub fn goto_index(index: i64) -> Self {
        let id = index.max(0).saturating_add(1);
        Command::GotoClip(u32::try_from(id).unwrap_or(u32::MAX))
    }

    /// The exact text written to the socket, without the final CRLF.
    pub fn to_wire(&self) -> String {
        match self {
            Command::Ping => "ping".into(),
            Command::Notify(flags) => format!(
                "notify:\nslot: {}\nremote: {}\nconfiguration: {}\n\n",
                flags.contains(NotifyFlags::SLOT),
                flags.contains(NotifyFlags::REMOTE),
                flags.contains(NotifyFlags::CONFIGURATION),
            ),
            Command::Record => "record".into(),
            Command::RecordNamed(name) => format!("record: name: {name}"),
            Command::Stop => "stop".into(),
            Command::Play {
                single,
                looped,
                speed,
            } => format!("play:\nsingle clip: {single}\nloop: {looped}\nspeed: {speed}\n\n"),
            Command::Jog(timecode) => format!("jog: timecode: {timecode}"),
            Command::TransportInfo => "transport info".into(),
            Command::GotoClip(id) => format!("goto: clip id: {id}"),
            Command::GotoClipOffset(offset) => format!("goto: clip id: {offset:+}"),
            Command::ClipsGet => "clips get".into(),
            Command::SlotSelect(slot) => format!("slot select: slot id: {slot}"),
            Command::SlotInfo(None) => "slot info".into(),
            Command::SlotInfo(Some(slot)) => format!("slot info: slot id: {slot}"),
            Command::Raw(text) => text.clone(),
        }
    }

    /// Check that the command renders to exactly one command block.
    ///
    /// A line break inside a name or timecode would reach the deck as a
    /// second command and earn a second reply. `Raw` text may span lines
    /// only as a well-formed multi-line command.
    pub fn validate(&self) -> Result<(), DeckError> {
        match self {
            Command::RecordNamed(value) | Command::Jog(value) => {
                if value.contains(['\r', '\n']) {
                    return Err(DeckError::InvalidArgument(format!(
                        "line break in {value:?}"
                    )));
                }
                Ok(())
            }
            Command::Raw(text) if !is_single_block(text) => Err(DeckError::InvalidArgument(
                format!("raw command is not a single command: {text:?}"),
            )),
            _ => Ok(()),
        }
    }

    /// The command as transcript lines, split on newlines.
    pub fn transcript_lines(&self) -> Vec<String> {
        self.to_wire().split('\n').map(str::to_string).collect()
    }
}

/// One line, or a `header:` line followed by non-empty body lines and
/// optional trailing newlines.
fn is_single_block(text: &str) -> bool {
    if text.contains('\r') {
        return false;
    }
    let mut lines = text.trim_end_matches('\n').split('\n');
    let header = lines.next().unwrap_or_default();
    if header.is_empty() {
        return false;
    }
    if !header.ends_with(':') {
        return !text.contains('\n');
    }
    lines.all(|line| !line.is_empty())
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wire = self.to_wire();
        match wire.split_once('\n') {
            Some((header, _)) => write!(f, "{header}"),
            None => write!(f, "{wire}"),
        }
    }
}
