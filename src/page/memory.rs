/// In-memory page driver
///
/// Holds a sequence of documents (one per lecture), scripted click reactions and
/// text tracks whose cues only appear once the track is enabled. Every gesture
/// is recorded so callers can assert what the engine did to the page.
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use scraper::Html;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use url::Url;

use super::{count_matches, Page, TextTrack, TrackMode};

/// What happens when a scripted element is clicked
#[derive(Debug, Clone)]
pub enum Effect {
    /// Swap the document body immediately (same page, no navigation)
    ReplaceHtml(String),
    /// Swap the document after a delay, like a panel rendering asynchronously
    ReplaceHtmlAfter(String, Duration),
    /// Navigate to the next document in the sequence
    NavigateNext,
    /// The page breaks: every later read fails with this message
    Break(String),
}

/// A gesture the engine performed on the page
#[derive(Debug, Clone, PartialEq)]
pub enum PageAction {
    Hover(String),
    Click(String, usize),
    TrackMode(usize, TrackMode),
}

/// One loaded document
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    pub url: Url,
    pub html: String,
    pub tracks: Vec<TextTrack>,
    reactions: Vec<(String, Effect)>,
}

impl MemoryDocument {
    pub fn new(url: &str, html: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url)?,
            html: html.into(),
            tracks: Vec::new(),
            reactions: Vec::new(),
        })
    }

    pub fn with_track(mut self, mut track: TextTrack) -> Self {
        track.index = self.tracks.len();
        self.tracks.push(track);
        self
    }

    /// React to clicks on elements matching `selector`
    pub fn on_click(mut self, selector: &str, effect: Effect) -> Self {
        self.reactions.push((selector.to_string(), effect));
        self
    }
}

#[derive(Debug)]
struct MemoryState {
    documents: Vec<MemoryDocument>,
    cursor: usize,
    generation: u64,
    pending: Option<(String, Instant)>,
    broken: Option<String>,
    actions: Vec<PageAction>,
}

impl MemoryState {
    fn current(&self) -> &MemoryDocument {
        &self.documents[self.cursor]
    }

    fn current_mut(&mut self) -> &mut MemoryDocument {
        &mut self.documents[self.cursor]
    }

    fn apply_pending(&mut self) {
        if let Some((html, ready_at)) = self.pending.take() {
            if Instant::now() >= ready_at {
                self.current_mut().html = html;
            } else {
                self.pending = Some((html, ready_at));
            }
        }
    }

    fn check_broken(&self) -> Result<()> {
        match &self.broken {
            Some(reason) => Err(anyhow!("page error: {}", reason)),
            None => Ok(()),
        }
    }
}

/// Scriptable in-memory page
#[derive(Debug)]
pub struct MemoryPage {
    state: Mutex<MemoryState>,
    latency: Duration,
}

impl MemoryPage {
    pub fn new(document: MemoryDocument) -> Self {
        Self::course(vec![document])
    }

    /// A page that walks through `documents` when `Effect::NavigateNext` fires
    pub fn course(documents: Vec<MemoryDocument>) -> Self {
        assert!(!documents.is_empty(), "a memory page needs at least one document");
        Self {
            state: Mutex::new(MemoryState {
                documents,
                cursor: 0,
                generation: 0,
                pending: None,
                broken: None,
                actions: Vec::new(),
            }),
            latency: Duration::ZERO,
        }
    }

    /// Delay every driver call, to make overlapping requests observable
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Gestures performed so far
    pub fn actions(&self) -> Vec<PageAction> {
        self.lock().actions.clone()
    }

    pub fn click_count(&self) -> usize {
        self.lock()
            .actions
            .iter()
            .filter(|a| matches!(a, PageAction::Click(..)))
            .count()
    }

    /// Any gesture or track change at all
    pub fn is_untouched(&self) -> bool {
        self.lock().actions.is_empty()
    }

    /// Index of the document currently loaded
    pub fn position(&self) -> usize {
        self.lock().cursor
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-call; the state is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Page for MemoryPage {
    async fn url(&self) -> Result<Url> {
        self.simulate_latency().await;
        let state = self.lock();
        state.check_broken()?;
        Ok(state.current().url.clone())
    }

    async fn content(&self) -> Result<String> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.check_broken()?;
        state.apply_pending();
        Ok(state.current().html.clone())
    }

    fn generation(&self) -> u64 {
        self.lock().generation
    }

    async fn hover(&self, selector: &str) -> Result<bool> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.check_broken()?;
        state.actions.push(PageAction::Hover(selector.to_string()));
        let document = Html::parse_document(&state.current().html);
        Ok(count_matches(&document, selector) > 0)
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<bool> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.check_broken()?;
        state.apply_pending();

        let exists = {
            let document = Html::parse_document(&state.current().html);
            count_matches(&document, selector) > index
        };
        if !exists {
            return Ok(false);
        }

        state.actions.push(PageAction::Click(selector.to_string(), index));

        let effect = state
            .current()
            .reactions
            .iter()
            .find(|(s, _)| s == selector)
            .map(|(_, effect)| effect.clone());

        match effect {
            Some(Effect::ReplaceHtml(html)) => state.current_mut().html = html,
            Some(Effect::ReplaceHtmlAfter(html, delay)) => {
                state.pending = Some((html, Instant::now() + delay));
            }
            Some(Effect::NavigateNext) => {
                if state.cursor + 1 < state.documents.len() {
                    state.cursor += 1;
                    state.generation += 1;
                    state.pending = None;
                }
            }
            Some(Effect::Break(reason)) => state.broken = Some(reason),
            None => {}
        }

        Ok(true)
    }

    async fn text_tracks(&self) -> Result<Vec<TextTrack>> {
        self.simulate_latency().await;
        let state = self.lock();
        state.check_broken()?;
        Ok(state
            .current()
            .tracks
            .iter()
            .map(|track| {
                let mut visible = track.clone();
                if visible.mode == TrackMode::Disabled {
                    visible.cues.clear();
                }
                visible
            })
            .collect())
    }

    async fn set_track_mode(&self, index: usize, mode: TrackMode) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.check_broken()?;
        state.actions.push(PageAction::TrackMode(index, mode));
        let track = state
            .current_mut()
            .tracks
            .get_mut(index)
            .ok_or_else(|| anyhow!("no text track at index {}", index))?;
        track.mode = mode;
        Ok(())
    }
}
