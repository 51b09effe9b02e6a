//! Page drivers
//!
//! The engine never touches a browser directly. It talks to a [`Page`]: the
//! current document's HTML, the media element's text tracks, and the few user
//! gestures activation needs. Drivers decide what those mean.

pub mod http;
pub mod memory;
pub mod replay;

use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

pub use http::HttpPage;
pub use memory::{Effect, MemoryDocument, MemoryPage, PageAction};
pub use replay::load_replay_course;

/// Text track kinds as exposed by a media element
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Captions,
    Subtitles,
    Descriptions,
    Chapters,
    Metadata,
}

impl TrackKind {
    /// Parse the `kind` attribute; a missing or unknown value means subtitles
    pub fn from_attr(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("captions") => TrackKind::Captions,
            Some("descriptions") => TrackKind::Descriptions,
            Some("chapters") => TrackKind::Chapters,
            Some("metadata") => TrackKind::Metadata,
            _ => TrackKind::Subtitles,
        }
    }

    pub fn is_spoken_text(&self) -> bool {
        matches!(self, TrackKind::Captions | TrackKind::Subtitles)
    }
}

/// Text track mode; cues are only loaded once a track leaves `Disabled`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    Disabled,
    Hidden,
    Showing,
}

/// One cue of a text track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackCue {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// A text track attached to the page's media element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextTrack {
    pub index: usize,
    pub kind: TrackKind,
    pub label: Option<String>,
    pub language: Option<String>,
    pub mode: TrackMode,
    pub src: Option<String>,
    pub cues: Vec<TrackCue>,
}

/// Driver for the currently loaded page
#[async_trait]
pub trait Page: Send + Sync {
    /// Current document URL
    async fn url(&self) -> Result<Url>;

    /// Current serialised document
    async fn content(&self) -> Result<String>;

    /// Incremented on every navigation; the extractor bound to an older
    /// generation is considered destroyed
    fn generation(&self) -> u64;

    /// Simulate pointer movement over the first element matching `selector`
    async fn hover(&self, selector: &str) -> Result<bool>;

    /// Click the `index`-th element matching `selector`; false when absent
    async fn click_nth(&self, selector: &str, index: usize) -> Result<bool>;

    /// Text tracks of the page's media element
    async fn text_tracks(&self) -> Result<Vec<TextTrack>>;

    /// Change a track's mode, which may trigger cue loading
    async fn set_track_mode(&self, index: usize, mode: TrackMode) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<bool> {
        self.click_nth(selector, 0).await
    }
}

/// Parse a CSS selector, logging instead of failing on bad input
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::debug!("Invalid selector '{}': {:?}", css, e);
            None
        }
    }
}

/// Number of elements matching `css` in `document`
pub fn count_matches(document: &Html, css: &str) -> usize {
    selector(css).map(|s| document.select(&s).count()).unwrap_or(0)
}

/// Text content of an element, whitespace-collapsed
pub fn element_text(element: &ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether the element is hidden through attributes or inline style
pub fn is_hidden(element: &ElementRef) -> bool {
    let value = element.value();
    if value.attr("hidden").is_some() || value.attr("aria-hidden") == Some("true") {
        return true;
    }

    value
        .attr("style")
        .map(|style| {
            let style = style.replace(' ', "").to_ascii_lowercase();
            style.contains("display:none") || style.contains("visibility:hidden")
        })
        .unwrap_or(false)
}

/// `<track>` elements of the first media element in the document
pub fn parse_track_elements(document: &Html, base: &Url) -> Vec<TextTrack> {
    let Some(track_selector) = selector("video track, audio track") else {
        return Vec::new();
    };

    document
        .select(&track_selector)
        .enumerate()
        .map(|(index, element)| {
            let attrs = element.value();
            let mode = if attrs.attr("default").is_some() {
                TrackMode::Showing
            } else {
                TrackMode::Disabled
            };

            TextTrack {
                index,
                kind: TrackKind::from_attr(attrs.attr("kind")),
                label: attrs.attr("label").map(str::to_string),
                language: attrs.attr("srclang").map(str::to_string),
                mode,
                src: attrs
                    .attr("src")
                    .and_then(|src| base.join(src).ok())
                    .map(|u| u.to_string()),
                cues: Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_kind_from_attr() {
        assert_eq!(TrackKind::from_attr(Some("captions")), TrackKind::Captions);
        assert_eq!(TrackKind::from_attr(Some("CHAPTERS")), TrackKind::Chapters);
        assert_eq!(TrackKind::from_attr(None), TrackKind::Subtitles);
        assert!(TrackKind::Captions.is_spoken_text());
        assert!(!TrackKind::Metadata.is_spoken_text());
    }

    #[test]
    fn test_parse_track_elements() {
        let html = Html::parse_document(
            r#"<video><track kind="captions" srclang="en" label="English" src="subs/en.vtt" default>
               <track kind="chapters" src="/chapters.vtt"></video>"#,
        );
        let base = Url::parse("https://www.udemy.com/course/rust/learn/lecture/1").unwrap();
        let tracks = parse_track_elements(&html, &base);

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].kind, TrackKind::Captions);
        assert_eq!(tracks[0].mode, TrackMode::Showing);
        assert_eq!(
            tracks[0].src.as_deref(),
            Some("https://www.udemy.com/course/rust/learn/lecture/subs/en.vtt")
        );
        assert_eq!(tracks[1].kind, TrackKind::Chapters);
        assert_eq!(tracks[1].mode, TrackMode::Disabled);
    }

    #[test]
    fn test_hidden_detection() {
        let html = Html::parse_fragment(
            r#"<button id="a" hidden>x</button><button id="b" style="display: none">y</button><button id="c">z</button>"#,
        );
        let sel = selector("button").unwrap();
        let hidden: Vec<bool> = html.select(&sel).map(|e| is_hidden(&e)).collect();
        assert_eq!(hidden, vec![true, true, false]);
    }
}
