//! Supported e-learning platforms
//!
//! Each platform is one variant behind [`PlatformExtractor`]; all selector
//! knowledge for a platform lives in its [`PlatformSelectors`] table and its
//! URL rules. Probe, activation and extraction are shared algorithms driven by
//! those tables.

pub mod coursera;
pub mod udemy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::activation::{ActivationReport, Activator};
use crate::config::{ActivationConfig, ExtractionConfig};
use crate::error::Result;
use crate::extraction::ExtractionChain;
use crate::outline::{CourseOutline, OutlineSelectors};
use crate::page::Page;
use crate::probe::{self, Availability};
use crate::transcript::Transcript;

pub use coursera::CourseraExtractor;
pub use udemy::UdemyExtractor;

/// Known platform identifiers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Udemy,
    Coursera,
    Unknown,
}

impl Platform {
    /// Match the host name against the known platforms
    pub fn detect(url: &Url) -> Self {
        let Some(host) = url.host_str() else {
            return Platform::Unknown;
        };
        let host = host.to_ascii_lowercase();

        if host_matches(&host, "udemy.com") {
            Platform::Udemy
        } else if host_matches(&host, "coursera.org") {
            Platform::Coursera
        } else {
            Platform::Unknown
        }
    }

    /// Whether the path has the shape of a lecture player page
    pub fn is_lecture_url(&self, url: &Url) -> bool {
        match self {
            Platform::Udemy => udemy::lecture_id_from_path(url.path()).is_some(),
            Platform::Coursera => coursera::lecture_id_from_path(url.path()).is_some(),
            Platform::Unknown => false,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Udemy => "udemy",
            Platform::Coursera => "coursera",
            Platform::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Selector table for one platform
#[derive(Debug)]
pub struct PlatformSelectors {
    /// Transcript panel containers
    pub panel: &'static [&'static str],
    /// Entry elements inside the panel
    pub panel_entry: &'static [&'static str],
    /// Controls that toggle the transcript or captions
    pub toggle: &'static [&'static str],
    /// Surfaces that reveal player controls on pointer movement
    pub controls_surface: &'static [&'static str],
    /// Options of the caption language menu
    pub caption_menu_item: &'static [&'static str],
    /// The player's own "next lecture" control
    pub next_button: &'static [&'static str],
    /// Course curriculum layout
    pub outline: OutlineSelectors,
}

/// Per-platform capability interface
#[async_trait]
pub trait PlatformExtractor: Send + Sync {
    fn platform(&self) -> Platform;

    fn selectors(&self) -> &'static PlatformSelectors;

    /// Lecture identifier from the page URL
    fn lecture_id(&self, url: &Url) -> Option<String>;

    /// Lecture identifier from a curriculum link
    fn lecture_id_from_href(&self, href: &str) -> Option<String>;

    async fn probe(&self, page: &dyn Page) -> Result<Availability> {
        probe::probe_page(page, self.platform(), self.selectors()).await
    }

    async fn activate(&self, page: &dyn Page, config: &ActivationConfig) -> Result<ActivationReport> {
        Activator::new(self.selectors(), config.clone()).run(page).await
    }

    async fn extract(&self, page: &dyn Page, config: &ExtractionConfig) -> Result<Transcript> {
        ExtractionChain::standard(self.selectors(), config.clone())
            .run(page, self.platform())
            .await
    }

    async fn outline(&self, page: &dyn Page) -> Result<CourseOutline> {
        let html = page.content().await?;
        let current = page.url().await.ok().and_then(|url| self.lecture_id(&url));
        Ok(CourseOutline::parse(
            &html,
            &self.selectors().outline,
            |href| self.lecture_id_from_href(href),
            current.as_deref(),
        ))
    }
}

/// Select the extractor variant for a platform
pub fn for_platform(platform: Platform) -> Option<Box<dyn PlatformExtractor>> {
    match platform {
        Platform::Udemy => Some(Box::new(UdemyExtractor)),
        Platform::Coursera => Some(Box::new(CourseraExtractor)),
        Platform::Unknown => None,
    }
}

/// Select the extractor variant for a page URL
pub fn for_url(url: &Url) -> Option<Box<dyn PlatformExtractor>> {
    for_platform(Platform::detect(url))
}
