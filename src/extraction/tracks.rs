/// Native text track cue extraction
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{ExtractionStrategy, StrategyKind};
use crate::config::ExtractionConfig;
use crate::page::{Page, TextTrack, TrackKind, TrackMode};
use crate::poll::poll_until;
use crate::transcript::TranscriptEntry;

/// Captions first, then subtitles, then whatever track comes first
pub fn choose_track(tracks: &[TextTrack]) -> Option<&TextTrack> {
    tracks
        .iter()
        .find(|t| t.kind == TrackKind::Captions)
        .or_else(|| tracks.iter().find(|t| t.kind == TrackKind::Subtitles))
        .or_else(|| tracks.first())
}

pub struct TrackCueStrategy {
    config: ExtractionConfig,
}

impl TrackCueStrategy {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ExtractionStrategy for TrackCueStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TrackCues
    }

    async fn extract(&self, page: &dyn Page) -> Result<Vec<TranscriptEntry>> {
        let tracks = page.text_tracks().await?;
        let Some(track) = choose_track(&tracks) else {
            debug!("No text tracks on page");
            return Ok(Vec::new());
        };
        let index = track.index;

        if track.mode != TrackMode::Showing {
            page.set_track_mode(index, TrackMode::Showing).await?;
        }

        let cues = poll_until(self.config.track_poll(), self.config.track_wait(), || async move {
            let tracks = page.text_tracks().await.ok()?;
            let track = tracks.into_iter().find(|t| t.index == index)?;
            (!track.cues.is_empty()).then_some(track.cues)
        })
        .await
        .unwrap_or_default();

        debug!("Track {} yielded {} cues", index, cues.len());

        Ok(cues
            .into_iter()
            .filter_map(|cue| TranscriptEntry::new(Some(cue.start_seconds), &cue.text))
            .collect())
    }
}
