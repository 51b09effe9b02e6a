/// Capability probe
///
/// Answers whether the current page belongs to a supported platform and whether a
/// transcript can be had, without touching the page: no clicks, no hovering, no
/// track mode changes.
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::extraction::panel::find_panel;
use crate::page::{is_hidden, selector, Page, TextTrack};
use crate::platform::{self, Platform, PlatformExtractor, PlatformSelectors};

/// Probe outcome, computed fresh on every call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Availability {
    pub platform: Platform,
    pub has_transcript: bool,
    pub is_supported_page: bool,
}

impl Availability {
    pub fn unsupported() -> Self {
        Self {
            platform: Platform::Unknown,
            has_transcript: false,
            is_supported_page: false,
        }
    }
}

/// The first positive signal found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSignal {
    PanelContent,
    TextTrack,
    ToggleControl,
}

const LABEL_HINTS: [&str; 3] = ["transcript", "caption", "subtitle"];

/// Check the document and tracks for any sign of a transcript
pub fn detect_signal(html: &str, tracks: &[TextTrack], selectors: &PlatformSelectors) -> Option<TranscriptSignal> {
    let document = Html::parse_document(html);

    if find_panel(&document, selectors).is_some() {
        return Some(TranscriptSignal::PanelContent);
    }

    if tracks.iter().any(|t| !t.cues.is_empty() || t.kind.is_spoken_text()) {
        return Some(TranscriptSignal::TextTrack);
    }

    let platform_toggle = selectors.toggle.iter().any(|css| {
        selector(css)
            .map(|s| document.select(&s).any(|e| !is_hidden(&e)))
            .unwrap_or(false)
    });

    let labelled_control = selector("button, [role='button'], [role='tab']")
        .map(|s| {
            document.select(&s).any(|e| {
                let value = e.value();
                let label = [value.attr("aria-label"), value.attr("data-purpose"), value.attr("title")]
                    .iter()
                    .flatten()
                    .map(|v| v.to_ascii_lowercase())
                    .collect::<Vec<_>>()
                    .join(" ");
                !is_hidden(&e) && LABEL_HINTS.iter().any(|hint| label.contains(hint))
            })
        })
        .unwrap_or(false);

    (platform_toggle || labelled_control).then_some(TranscriptSignal::ToggleControl)
}

/// Probe a page whose platform is already known
pub async fn probe_page(page: &dyn Page, platform: Platform, selectors: &PlatformSelectors) -> Result<Availability> {
    let url = page.url().await?;
    let is_supported_page = platform.is_lecture_url(&url);

    let html = page.content().await?;
    let tracks = page.text_tracks().await?;
    let signal = detect_signal(&html, &tracks, selectors);

    debug!("Probe {} ({}): signal {:?}", url, platform, signal);

    Ok(Availability {
        platform,
        has_transcript: signal.is_some(),
        is_supported_page,
    })
}

/// Probe any page, detecting the platform from its URL
pub async fn probe(page: &dyn Page) -> Result<Availability> {
    let url = page.url().await?;
    match platform::for_url(&url) {
        Some(extractor) => extractor.probe(page).await,
        None => {
            debug!("Probe {}: unsupported host", url);
            Ok(Availability::unsupported())
        }
    }
}
