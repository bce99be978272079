//! Lyrics and LRC parsing
//!
//! The lyrics endpoint returns plain text and, when available, LRC
//! subtitles (`[mm:ss.xx] line`). Synced lines drive the highlighted line
//! in the lyrics view through [`Lyrics::active_line`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// One timed lyric line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub time: Duration,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lyrics {
    pub track_id: i64,
    /// Unsynced text
    pub plain: Option<String>,
    /// Synced lines ordered by time; empty when only plain text exists
    pub lines: Vec<LyricLine>,
    pub provider: Option<String>,
}

impl Lyrics {
    pub fn is_synced(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Index of the line to highlight at `position`: the last line whose
    /// timestamp is not after it. `None` before the first line.
    pub fn active_line(&self, position: Duration) -> Option<usize> {
        let after = self.lines.partition_point(|line| line.time <= position);
        after.checked_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.plain.as_deref().map_or(true, |p| p.trim().is_empty())
    }
}

/// Parse LRC text. Metadata tags (`[ar:...]`) are skipped, lines with
/// several timestamps are repeated, and the result is sorted by time.
pub fn parse_lrc(text: &str) -> Vec<LyricLine> {
    let mut lines = Vec::new();

    for raw in text.lines() {
        let mut rest = raw.trim();
        let mut stamps = Vec::new();

        while let Some(body) = rest.strip_prefix('[') {
            let Some(close) = body.find(']') else { break };
            match parse_timestamp(&body[..close]) {
                Some(time) => stamps.push(time),
                None => break,
            }
            rest = &body[close + 1..];
        }

        let text = rest.trim();
        for time in stamps {
            lines.push(LyricLine {
                time,
                text: text.to_string(),
            });
        }
    }

    lines.sort_by_key(|line| line.time);
    lines
}

/// `mm:ss`, `mm:ss.xx`, `mm:ss.xxx` or `mm:ss:xx`.
fn parse_timestamp(stamp: &str) -> Option<Duration> {
    let (minutes, rest) = stamp.split_once(':')?;
    let minutes: u64 = minutes.trim().parse().ok()?;

    let (seconds, fraction) = match rest.find(['.', ':']) {
        Some(split) => (&rest[..split], Some(&rest[split + 1..])),
        None => (rest, None),
    };
    let seconds: u64 = seconds.trim().parse().ok()?;
    if seconds >= 60 {
        return None;
    }

    let millis = match fraction {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            // Scale to milliseconds: "5" -> 500, "34" -> 340, "345" -> 345
            let padded: String = digits.chars().chain("000".chars()).take(3).collect();
            padded.parse::<u64>().ok()?
        }
        Some(_) => return None,
        None => 0,
    };

    Some(Duration::from_millis((minutes * 60 + seconds) * 1000 + millis))
}

/// Build [`Lyrics`] from a lyrics endpoint response (object, or array
/// holding the object). `None` when the response carries no lyrics.
pub fn parse_lyrics_response(value: &Value, track_id: i64) -> Option<Lyrics> {
    let body = match value {
        Value::Array(items) => items
            .iter()
            .find(|item| item.get("lyrics").is_some() || item.get("subtitles").is_some())?,
        other => other,
    };

    let text = |field: &str| {
        body.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let lyrics = Lyrics {
        track_id,
        plain: text("lyrics"),
        lines: text("subtitles").map(|s| parse_lrc(&s)).unwrap_or_default(),
        provider: text("lyricsProvider"),
    };

    (!lyrics.is_empty()).then_some(lyrics)
}
