use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use super::{Platform, PlatformExtractor, PlatformSelectors};
use crate::outline::OutlineSelectors;

static SELECTORS: PlatformSelectors = PlatformSelectors {
    panel: &[
        "[data-purpose='transcript-panel']",
        "[class*='transcript--transcript-panel']",
    ],
    panel_entry: &[
        "[data-purpose='transcript-cue']",
        "[class*='transcript--cue-container']",
        "p",
    ],
    toggle: &[
        "button[data-purpose='transcript-toggle']",
        "button[aria-label*='ranscript']",
        "button[data-purpose='captions-dropdown-button']",
    ],
    controls_surface: &[
        "[data-purpose='video-player']",
        "[class*='video-player--container']",
        "video",
    ],
    caption_menu_item: &[
        "[data-purpose='captions-dropdown-menu'] [role='menuitemradio']",
        "[data-purpose='captions-dropdown-menu'] button",
    ],
    next_button: &[
        "[data-purpose='go-to-next']",
        "#go-to-next-item",
    ],
    outline: OutlineSelectors {
        section: "[data-purpose^='section-panel-']",
        section_title: "[data-purpose='section-title'], h3",
        item: "[data-purpose^='curriculum-item-']",
        item_title: "[data-purpose='item-title']",
        item_duration: "[data-purpose='item-duration'], [class*='metadata'] span",
        item_link: "a[href]",
        id_attribute: "data-lecture-id",
    },
};

/// Udemy lecture player (`/course/<slug>/learn/lecture/<id>`)
#[derive(Debug, Clone, Copy, Default)]
pub struct UdemyExtractor;

fn lecture_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/course/[^/]+/learn/lecture/(\d+)").expect("valid regex"))
}

pub fn lecture_id_from_path(path: &str) -> Option<String> {
    lecture_regex()
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl PlatformExtractor for UdemyExtractor {
    fn platform(&self) -> Platform {
        Platform::Udemy
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
            lecture_id_from_path("/course/rust-101/learn/lecture/4711"),
            Some("4711".to_string())
        );
        assert_eq!(lecture_id_from_path("/course/rust-101/"), None);
    }

    #[test]
    fn test_lecture_id_from_url_ignores_fragment() {
        let url = Url::parse("https://www.udemy.com/course/rust-101/learn/lecture/42#questions").unwrap();
        assert_eq!(UdemyExtractor.lecture_id(&url), Some("42".to_string()));
    }
}
