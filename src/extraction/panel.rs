/// Structured scrape of a rendered transcript panel
use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::debug;

use super::{ExtractionStrategy, StrategyKind};
use crate::page::{element_text, selector, Page};
use crate::platform::PlatformSelectors;
use crate::transcript::{is_meaningful, normalize_text, split_leading_timestamp, TranscriptEntry};

/// First panel container that has at least one entry element
pub fn find_panel<'a>(document: &'a Html, selectors: &PlatformSelectors) -> Option<ElementRef<'a>> {
    selectors.panel.iter().find_map(|css| {
        let sel = selector(css)?;
        document
            .select(&sel)
            .find(|panel| !raw_entries(panel, selectors).is_empty())
    })
}

/// Raw text of each entry element inside `panel`, using the first entry selector that matches
pub fn raw_entries(panel: &ElementRef, selectors: &PlatformSelectors) -> Vec<String> {
    for css in selectors.panel_entry {
        let Some(sel) = selector(css) else {
            continue;
        };

        let texts: Vec<String> = panel
            .select(&sel)
            .map(|e| element_text(&e))
            .filter(|t| !t.is_empty())
            .collect();

        if !texts.is_empty() {
            return texts;
        }
    }

    Vec::new()
}

/// Number of entries in the rendered panel, zero when there is no panel
pub fn panel_entry_count(html: &str, selectors: &PlatformSelectors) -> usize {
    let document = Html::parse_document(html);
    find_panel(&document, selectors)
        .map(|panel| raw_entries(&panel, selectors).len())
        .unwrap_or(0)
}

/// Turn raw panel lines into entries.
///
/// The remainder after the time token must have at least `min_chars`
/// characters and a letter; anything shorter is UI chrome.
pub fn parse_panel_lines(lines: &[String], min_chars: usize) -> Vec<TranscriptEntry> {
    lines
        .iter()
        .filter_map(|line| {
            let (timestamp, rest) = split_leading_timestamp(line);
            let rest = normalize_text(rest);
            if rest.chars().count() < min_chars || !is_meaningful(&rest) {
                return None;
            }
            TranscriptEntry::new(timestamp, &rest)
        })
        .collect()
}

pub struct PanelStrategy {
    selectors: &'static PlatformSelectors,
    min_entry_chars: usize,
}

impl PanelStrategy {
    pub fn new(selectors: &'static PlatformSelectors, min_entry_chars: usize) -> Self {
        Self {
            selectors,
            min_entry_chars,
        }
    }
}

#[async_trait]
impl ExtractionStrategy for PanelStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Panel
    }

    async fn extract(&self, page: &dyn Page) -> Result<Vec<TranscriptEntry>> {
        let html = page.content().await?;
        let lines = {
            let document = Html::parse_document(&html);
            match find_panel(&document, self.selectors) {
                Some(panel) => raw_entries(&panel, self.selectors),
                None => Vec::new(),
            }
        };

        debug!("Panel strategy found {} raw entries", lines.len());
        Ok(parse_panel_lines(&lines, self.min_entry_chars))
    }
}
