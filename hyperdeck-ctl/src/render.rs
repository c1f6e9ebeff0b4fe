//! Text output for the terminal.

use hyperdeck_core::{Clip, DeckEvent, Response, StatusMap};

/// Clip table with 1-based ids, the numbering `goto` expects.
pub fn clip_table(clips: &[Clip]) -> String {
    if clips.is_empty() {
        return "no clips".to_string();
    }
    let width = clips.iter().map(|c| c.name.len()).max().unwrap_or(0).max(4);
    let mut out = format!("{:>3}  {:<width$}  {:<11}  {}\n", "id", "name", "timecode", "duration");
    for (i, clip) in clips.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}  {:<width$}  {:<11}  {}\n",
            i + 1,
            clip.name,
            clip.timecode,
            clip.duration
        ));
    }
    out.pop();
    out
}

/// `key: value` lines, sorted by key.
pub fn properties(map: &StatusMap) -> String {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort();
    entries
        .into_iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The raw lines of a response.
pub fn response(response: &Response) -> String {
    response.lines().join("\n")
}

/// One event as a single human-readable line.
pub fn event_line(event: &DeckEvent) -> String {
    match event {
        DeckEvent::ClipsChanged => "clips changed".to_string(),
        DeckEvent::StatusChanged => "status changed".to_string(),
        DeckEvent::Transcript { sent, received } => {
            let sent = sent.first().map(String::as_str).unwrap_or_default();
            let received = received.first().map(String::as_str).unwrap_or_default();
            format!("> {sent}  < {received}")
        }
        DeckEvent::ConnectionLost { reason } => format!("connection lost: {reason}"),
    }
}

/// One event as a JSON object.
pub fn event_json(event: &DeckEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(name: &str) -> Clip {
        Clip {
            name: name.into(),
            timecode: "00:00:00:00".into(),
            duration: "00:00:05:00".into(),
        }
    }

    #[test]
    fn clip_table_numbers_from_one() {
        let table = clip_table(&[clip("Intro"), clip("Main Show")]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("name"));
        assert!(lines[1].trim_start().starts_with("1  Intro"));
        assert!(lines[2].trim_start().starts_with("2  Main Show"));
    }

    #[test]
    fn empty_clip_table() {
        assert_eq!(clip_table(&[]), "no clips");
    }

    #[test]
    fn properties_are_sorted() {
        let map: StatusMap = [("status", "play"), ("speed", "100")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(properties(&map), "speed: 100\nstatus: play");
    }

    #[test]
    fn transcript_line_shows_headers() {
        let event = DeckEvent::Transcript {
            sent: vec!["play:".into(), "speed: 100".into()],
            received: vec!["200 ok".into()],
        };
        assert_eq!(event_line(&event), "> play:  < 200 ok");
    }

    #[test]
    fn events_as_json() {
        let json = event_json(&DeckEvent::ConnectionLost {
            reason: "eof".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"connection_lost","reason":"eof"}"#);
    }

    #[test]
    fn response_lines_joined() {
        let r = Response::new(208, vec!["208 transport info:".into(), "status: stopped".into()]);
        assert_eq!(response(&r), "208 transport info:\nstatus: stopped");
    }
}
