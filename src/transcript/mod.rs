/// Transcript data model
///
/// Timestamped text entries, the normalisation rules every entry obeys, and the
/// plain-text rendering handed to downstream consumers.

pub mod vtt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

pub use vtt::{parse_webvtt, VttCue};

use crate::extraction::StrategyKind;
use crate::platform::Platform;

/// One timestamped unit of spoken text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    /// Offset from the start of the lecture in seconds
    pub timestamp_seconds: Option<f64>,
    /// Normalised text, never empty and always containing a letter
    pub text: String,
}

impl TranscriptEntry {
    /// Build an entry, returning `None` when the text is noise
    pub fn new(timestamp_seconds: Option<f64>, text: &str) -> Option<Self> {
        let text = normalize_text(text);
        if !is_meaningful(&text) {
            return None;
        }

        Some(Self {
            timestamp_seconds: timestamp_seconds.filter(|t| t.is_finite() && *t >= 0.0),
            text,
        })
    }

    /// Split a leading time token such as `1:02`, `[00:10]` or `1:02:03` from the line
    pub fn from_line(line: &str) -> Option<Self> {
        let (timestamp, rest) = split_leading_timestamp(line);
        Self::new(timestamp, rest)
    }
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp_seconds {
            Some(seconds) => write!(f, "[{}] {}", format_timestamp(seconds), self.text),
            None => write!(f, "{}", self.text),
        }
    }
}

/// How timestamps appear in rendered text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampStyle {
    Bracketed,
    Stripped,
}

/// An ordered transcript extracted from one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub platform: Platform,
    pub strategy: StrategyKind,
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(platform: Platform, strategy: StrategyKind, entries: Vec<TranscriptEntry>) -> Self {
        Self {
            platform,
            strategy,
            entries: order_entries(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render one entry per line
    pub fn to_text(&self, style: TimestampStyle) -> String {
        self.entries
            .iter()
            .map(|entry| match style {
                TimestampStyle::Bracketed => entry.to_string(),
                TimestampStyle::Stripped => entry.text.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn word_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.text.split_whitespace().count())
            .sum()
    }
}

/// Sort entries by timestamp while keeping untimed entries where they were extracted.
///
/// An untimed entry sorts with the closest timed entry before it; leading untimed
/// entries stay first. Consecutive duplicates are collapsed.
pub fn order_entries(entries: Vec<TranscriptEntry>) -> Vec<TranscriptEntry> {
    let mut carried = f64::NEG_INFINITY;
    let mut keyed: Vec<(f64, TranscriptEntry)> = entries
        .into_iter()
        .map(|entry| {
            if let Some(ts) = entry.timestamp_seconds {
                carried = ts;
            }
            (carried, entry)
        })
        .collect();

    // sort_by is stable, so equal keys keep extraction order
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut ordered: Vec<TranscriptEntry> = keyed.into_iter().map(|(_, entry)| entry).collect();
    ordered.dedup();
    ordered
}

/// Collapse whitespace runs and trim
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Non-empty and contains at least one alphabetic character
pub fn is_meaningful(text: &str) -> bool {
    !text.trim().is_empty() && text.chars().any(|c| c.is_alphabetic())
}

fn leading_timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\[?\s*(\d{1,2}:\d{2}(?::\d{2})?)\s*\]?\s*[-–:|]?\s*").expect("valid regex")
    })
}

/// Split a leading `H?H:MM(:SS)?` token (optionally bracketed) from a line
pub fn split_leading_timestamp(line: &str) -> (Option<f64>, &str) {
    if let Some(captures) = leading_timestamp_regex().captures(line) {
        if let (Some(whole), Some(token)) = (captures.get(0), captures.get(1)) {
            if let Some(seconds) = parse_timestamp(token.as_str()) {
                return (Some(seconds), &line[whole.end()..]);
            }
        }
    }
    (None, line)
}

fn bracketed_timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[(\d{1,2}:\d{2}(?::\d{2})?)\]\s*").expect("valid regex"))
}

/// Split the `[MM:SS]` prefix written by [`format_timestamp`] from a stored line
///
/// Bare clock values such as `10:30 is when...` are left in the text.
pub fn split_bracketed_timestamp(line: &str) -> (Option<f64>, &str) {
    if let Some(captures) = bracketed_timestamp_regex().captures(line) {
        if let (Some(whole), Some(token)) = (captures.get(0), captures.get(1)) {
            if let Some(seconds) = parse_timestamp(token.as_str()) {
                return (Some(seconds), &line[whole.end()..]);
            }
        }
    }
    (None, line)
}

/// Parse `MM:SS` or `H:MM:SS` to seconds
pub fn parse_timestamp(token: &str) -> Option<f64> {
    let parts: Vec<&str> = token.trim().split(':').collect();
    let numbers: Vec<u32> = parts
        .iter()
        .map(|p| p.parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;

    match numbers.as_slice() {
        [minutes, seconds] if *seconds < 60 => Some((minutes * 60 + seconds) as f64),
        [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => {
            Some((hours * 3600 + minutes * 60 + seconds) as f64)
        }
        _ => None,
    }
}

/// Format seconds as `MM:SS`, or `H:MM:SS` from one hour on
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Cap `text` at `max_chars` characters, appending a marker when anything was cut
pub fn truncate_with_marker(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let kept = text[..cut].trim_end();
            (format!("{}\n[Transcript truncated at {} characters]", kept, max_chars), true)
        }
        None => (text.to_string(), false),
    }
}
