//! Extraction strategy chain
//!
//! Independent ways of reading a transcript off the page, tried in order. The
//! first one that yields any entry wins; results are never merged.

pub mod heuristic;
pub mod panel;
pub mod tracks;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::error::{EngineError, Result};
use crate::page::Page;
use crate::platform::{Platform, PlatformSelectors};
use crate::transcript::{Transcript, TranscriptEntry};

pub use heuristic::HeuristicStrategy;
pub use panel::PanelStrategy;
pub use tracks::TrackCueStrategy;

/// Which strategy produced a transcript
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Panel,
    TrackCues,
    Heuristic,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Panel => "panel",
            StrategyKind::TrackCues => "track-cues",
            StrategyKind::Heuristic => "heuristic",
        };
        write!(f, "{}", name)
    }
}

/// One way of reading transcript entries from a page
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn extract(&self, page: &dyn Page) -> anyhow::Result<Vec<TranscriptEntry>>;
}

/// Ordered list of strategies
pub struct ExtractionChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ExtractionChain {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Panel scrape, then track cues, then the heuristic scan
    pub fn standard(selectors: &'static PlatformSelectors, config: ExtractionConfig) -> Self {
        let min_chars = config.min_entry_chars;
        Self::new(vec![
            Box::new(PanelStrategy::new(selectors, min_chars)),
            Box::new(TrackCueStrategy::new(config)),
            Box::new(HeuristicStrategy::new(min_chars)),
        ])
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub async fn run(&self, page: &dyn Page, platform: Platform) -> Result<Transcript> {
        for strategy in &self.strategies {
            let kind = strategy.kind();
            match strategy.extract(page).await {
                Ok(entries) if !entries.is_empty() => {
                    let transcript = Transcript::new(platform, kind, entries);
                    info!("✅ Extracted {} entries using {} strategy", transcript.len(), kind);
                    return Ok(transcript);
                }
                Ok(_) => debug!("Strategy {} found nothing", kind),
                Err(e) => warn!("⚠️ Strategy {} failed: {}", kind, e),
            }
        }

        Err(EngineError::NoTranscriptContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::page::{MemoryDocument, MemoryPage, TextTrack, TrackCue, TrackKind, TrackMode};
    use crate::platform::{PlatformExtractor, UdemyExtractor};

    const URL: &str = "https://www.udemy.com/course/rust/learn/lecture/1";

    struct Failing;

    #[async_trait]
    impl ExtractionStrategy for Failing {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Panel
        }

        async fn extract(&self, _page: &dyn Page) -> anyhow::Result<Vec<TranscriptEntry>> {
            Err(anyhow::anyhow!("selector exploded"))
        }
    }

    fn chain() -> ExtractionChain {
        let config = ConfigBuilder::new().fast().build();
        ExtractionChain::standard(UdemyExtractor.selectors(), config.extraction)
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            chain().kinds(),
            vec![StrategyKind::Panel, StrategyKind::TrackCues, StrategyKind::Heuristic]
        );
    }

    #[tokio::test]
    async fn test_panel_wins_and_is_sorted() {
        let html = r#"<div data-purpose="transcript-panel">
            <div data-purpose="transcript-cue">[00:10] Hello world</div>
            <div data-purpose="transcript-cue">[00:05] Intro</div>
            <div data-purpose="transcript-cue">[]</div>
        </div>"#;
        let page = MemoryPage::new(MemoryDocument::new(URL, html).unwrap());

        let transcript = chain().run(&page, Platform::Udemy).await.unwrap();

        assert_eq!(transcript.strategy, StrategyKind::Panel);
        assert_eq!(transcript.to_text(crate::transcript::TimestampStyle::Bracketed), "[00:05] Intro\n[00:10] Hello world");
    }

    #[tokio::test]
    async fn test_falls_through_to_tracks() {
        let track = TextTrack {
            index: 0,
            kind: TrackKind::Subtitles,
            label: None,
            language: None,
            mode: TrackMode::Disabled,
            src: None,
            cues: vec![TrackCue {
                start_seconds: 12.0,
                end_seconds: 14.0,
                text: "From the caption track".into(),
            }],
        };
        let page = MemoryPage::new(MemoryDocument::new(URL, "<video></video>").unwrap().with_track(track));

        let transcript = chain().run(&page, Platform::Udemy).await.unwrap();
        assert_eq!(transcript.strategy, StrategyKind::TrackCues);
        assert_eq!(transcript.entries[0].timestamp_seconds, Some(12.0));
    }

    #[tokio::test]
    async fn test_failing_strategy_does_not_stop_chain() {
        let page = MemoryPage::new(
            MemoryDocument::new(URL, "<div class='transcript-body'>0:01 Recovered by heuristics</div>").unwrap(),
        );
        let chain = ExtractionChain::new(vec![Box::new(Failing), Box::new(HeuristicStrategy::new(4))]);

        let transcript = chain.run(&page, Platform::Udemy).await.unwrap();
        assert_eq!(transcript.strategy, StrategyKind::Heuristic);
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let page = MemoryPage::new(MemoryDocument::new(URL, "<main><p>No captions here</p></main>").unwrap());
        let result = chain().run(&page, Platform::Udemy).await;
        assert!(matches!(result, Err(EngineError::NoTranscriptContent)));
    }
}
