use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use super::{Platform, PlatformExtractor, PlatformSelectors};
use crate::outline::OutlineSelectors;

static SELECTORS: PlatformSelectors = PlatformSelectors {
    panel: &[
        "[data-track-component='interactive_transcript']",
        ".rc-Transcript",
        "[data-testid='transcript-panel']",
    ],
    panel_entry: &[
        ".rc-Phrase",
        "[data-testid='phrase']",
        ".rc-Paragraph",
    ],
    toggle: &[
        "button[data-track-component='focused_lex_nav_transcript_tab']",
        "[role='tab'][aria-label*='ranscript']",
        "button[aria-label*='ranscript']",
        "button[aria-label*='aptions']",
    ],
    controls_surface: &[
        ".rc-VideoMiniPlayer",
        "[data-testid='video-player']",
        "video",
    ],
    caption_menu_item: &[
        "[data-testid='subtitles-menu'] [role='menuitemradio']",
        ".rc-SubtitlesMenu button",
    ],
    next_button: &[
        "[data-testid='next-item']",
        "a[aria-label^='Next Item']",
    ],
    outline: OutlineSelectors {
        section: "[data-testid='named-item-list'], .rc-NamedItemListRefresh",
        section_title: "h2, h3",
        item: "li",
        item_title: "[data-testid='item-name'], .rc-WeekItemName",
        item_duration: "[data-testid='item-duration'], .rc-EffortText",
        item_link: "a[href*='/lecture/']",
        id_attribute: "data-item-id",
    },
};

/// Coursera lecture player (`/learn/<course>/lecture/<id>/<slug>`)
#[derive(Debug, Clone, Copy, Default)]
pub struct CourseraExtractor;

fn lecture_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/learn/[^/]+/lecture/([A-Za-z0-9_-]+)").expect("valid regex"))
}

pub fn lecture_id_from_path(path: &str) -> Option<String> {
    lecture_regex()
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl PlatformExtractor for CourseraExtractor {
    fn platform(&self) -> Platform {
        Platform::Coursera
    }

    fn selectors(&self) -> &'static PlatformSelectors {
        &SELECTORS
    }

    fn lecture_id(&self, url: &Url) -> Option<String> {
        lecture_id_from_path(url.path())
    }

    fn lecture_id_from_href(&self, href: &str) -> Option<String> {
        lecture_id_from_path(href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lecture_id_from_path() {
        assert_eq!(
            lecture_id_from_path("/learn/machine-learning/lecture/Ujm7v/welcome"),
            Some("Ujm7v".to_string())
        );
        assert_eq!(lecture_id_from_path("/learn/machine-learning/home/week/1"), None);
    }
}
