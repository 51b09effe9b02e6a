use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::normalize_text;

/// A single WebVTT cue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VttCue {
    /// Start timestamp
    pub start: Duration,
    /// End timestamp
    pub end: Duration,
    /// Cue payload with markup removed
    pub text: String,
}

/// Parse a WebVTT document into cues.
///
/// Header, NOTE, STYLE and REGION blocks are skipped, cue settings after the
/// timing line are ignored and inline tags such as `<v Speaker>` or `<c.yellow>`
/// are stripped.
pub fn parse_webvtt(content: &str) -> Result<Vec<VttCue>> {
    let content = content.trim_start_matches('\u{feff}');
    if !content.trim_start().starts_with("WEBVTT") {
        return Err(anyhow!("Missing WEBVTT header"));
    }

    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut cues = Vec::new();

    for block in normalized.split("\n\n") {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        let Some(timing_index) = lines.iter().position(|l| l.contains("-->")) else {
            continue;
        };

        let first = lines[0].trim_start();
        if first.starts_with("NOTE") || first.starts_with("STYLE") || first.starts_with("REGION") {
            continue;
        }

        let (start, end) = match parse_timing_line(lines[timing_index]) {
            Ok(timing) => timing,
            Err(e) => {
                tracing::debug!("Skipping cue with bad timing '{}': {}", lines[timing_index], e);
                continue;
            }
        };

        let payload = lines[timing_index + 1..].join(" ");
        let text = normalize_text(&strip_tags(&payload));
        if text.is_empty() {
            continue;
        }

        cues.push(VttCue { start, end, text });
    }

    Ok(cues)
}

/// Parse `00:01.000 --> 00:04.000 align:start` into a start/end pair
fn parse_timing_line(line: &str) -> Result<(Duration, Duration)> {
    let parts: Vec<&str> = line.split("-->").collect();
    if parts.len() != 2 {
        return Err(anyhow!("Invalid timing line"));
    }

    let start = parse_cue_timestamp(parts[0].trim())?;
    let end_token = parts[1].split_whitespace().next().unwrap_or("");
    let end = parse_cue_timestamp(end_token)?;

    Ok((start, end))
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm`
fn parse_cue_timestamp(timestamp: &str) -> Result<Duration> {
    let (clock, millis) = match timestamp.split_once('.') {
        Some((clock, millis)) => (clock, millis.parse::<u64>()?),
        None => (timestamp, 0),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds): (u64, u64, u64) = match parts.as_slice() {
        [m, s] => (0, m.parse()?, s.parse()?),
        [h, m, s] => (h.parse()?, m.parse()?, s.parse()?),
        _ => return Err(anyhow!("Invalid time format")),
    };

    let total_seconds = hours * 3600 + minutes * 60 + seconds;
    Ok(Duration::from_millis(total_seconds * 1000 + millis))
}

fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "WEBVTT\n\nNOTE generated\n\n1\n00:00:01.000 --> 00:00:04.000 align:start\n<v Instructor>Welcome to the course</v>\n\n00:05.500 --> 00:08.000\nToday we cover\nborrowing rules\n";

    #[test]
    fn test_parse_webvtt() {
        let cues = parse_webvtt(SAMPLE).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start, Duration::from_secs(1));
        assert_eq!(cues[0].text, "Welcome to the course");
        assert_eq!(cues[1].start, Duration::from_millis(5500));
        assert_eq!(cues[1].text, "Today we cover borrowing rules");
    }

    #[test]
    fn test_missing_header() {
        assert!(parse_webvtt("1\n00:00:01.000 --> 00:00:02.000\nhi").is_err());
    }

    #[test]
    fn test_cue_timestamp_formats() {
        assert_eq!(parse_cue_timestamp("01:01:01.250").unwrap(), Duration::from_millis(3_661_250));
        assert_eq!(parse_cue_timestamp("00:02.000").unwrap(), Duration::from_secs(2));
        assert!(parse_cue_timestamp("nonsense").is_err());
    }
}
