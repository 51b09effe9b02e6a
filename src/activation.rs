/// Transcript panel activation
///
/// Brings the platform's transcript panel into a scrapeable state: reveal the
/// player controls, press the transcript toggle, pick an English caption track
/// if a language menu pops up, then wait for entries to render. Every wait is a
/// bounded poll and running against an already open panel clicks nothing.
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ActivationConfig;
use crate::error::Result;
use crate::extraction::panel::panel_entry_count;
use crate::page::{element_text, is_hidden, selector, Page};
use crate::platform::PlatformSelectors;
use crate::poll::poll_until;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationState {
    Idle,
    ControlsRevealed,
    ButtonClicked,
    PanelWaiting,
    Active,
    TimedOut,
}

impl ActivationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivationState::Active | ActivationState::TimedOut)
    }
}

/// Outcome of one activation attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationReport {
    pub state: ActivationState,
    /// Clicks issued during this attempt
    pub clicks: usize,
    pub elapsed: Duration,
}

impl ActivationReport {
    pub fn is_active(&self) -> bool {
        self.state == ActivationState::Active
    }
}

pub struct Activator {
    selectors: &'static PlatformSelectors,
    config: ActivationConfig,
    state: ActivationState,
    clicks: usize,
}

impl Activator {
    pub fn new(selectors: &'static PlatformSelectors, config: ActivationConfig) -> Self {
        Self {
            selectors,
            config,
            state: ActivationState::Idle,
            clicks: 0,
        }
    }

    fn enter(&mut self, state: ActivationState) {
        debug!("Activation: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn report(&self, started: Instant) -> ActivationReport {
        ActivationReport {
            state: self.state,
            clicks: self.clicks,
            elapsed: started.elapsed(),
        }
    }

    /// Drive the machine to `Active` or `TimedOut`
    pub async fn run(mut self, page: &dyn Page) -> Result<ActivationReport> {
        let started = Instant::now();
        let deadline = started + self.config.timeout();

        if panel_entry_count(&page.content().await?, self.selectors) > 0 {
            self.enter(ActivationState::Active);
            debug!("Transcript panel already open");
            return Ok(self.report(started));
        }

        for surface in self.selectors.controls_surface {
            if page.hover(surface).await? {
                self.enter(ActivationState::ControlsRevealed);
                break;
            }
        }

        let selectors = self.selectors;
        let toggle = poll_until(self.config.poll_interval(), remaining(deadline), || async move {
            let html = page.content().await.ok()?;
            visible_toggle(&html, selectors)
        })
        .await;

        let Some((toggle, index)) = toggle else {
            self.enter(ActivationState::TimedOut);
            warn!("⚠️ No transcript toggle appeared within {} ms", self.config.timeout_ms);
            return Ok(self.report(started));
        };

        if page.click_nth(toggle, index).await? {
            self.clicks += 1;
            self.enter(ActivationState::ButtonClicked);
        }

        tokio::time::sleep(self.config.settle()).await;

        if let Some((menu_item, index)) = caption_option(&page.content().await?, selectors) {
            debug!("Selecting caption option {} of '{}'", index, menu_item);
            if page.click_nth(menu_item, index).await? {
                self.clicks += 1;
            }
        }

        self.enter(ActivationState::PanelWaiting);

        let active = poll_until(self.config.poll_interval(), remaining(deadline), || async move {
            let html = page.content().await.ok()?;
            (panel_entry_count(&html, selectors) > 0).then_some(())
        })
        .await;

        if active.is_some() {
            self.enter(ActivationState::Active);
            info!("✅ Transcript panel active after {} clicks", self.clicks);
        } else {
            self.enter(ActivationState::TimedOut);
            warn!("⚠️ Transcript panel did not render within {} ms", self.config.timeout_ms);
        }

        Ok(self.report(started))
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// First visible toggle control, as a selector and the index of the visible match
fn visible_toggle(html: &str, selectors: &PlatformSelectors) -> Option<(&'static str, usize)> {
    let document = Html::parse_document(html);
    selectors.toggle.iter().copied().find_map(|css| {
        let sel = selector(css)?;
        let index = document.select(&sel).position(|e| !is_hidden(&e))?;
        Some((css, index))
    })
}

/// Menu option for English or auto-generated captions, unless one is already checked
fn caption_option(html: &str, selectors: &PlatformSelectors) -> Option<(&'static str, usize)> {
    let document = Html::parse_document(html);

    for css in selectors.caption_menu_item.iter().copied() {
        let Some(sel) = selector(css) else {
            continue;
        };
        let options: Vec<_> = document.select(&sel).collect();
        if options.is_empty() {
            continue;
        }

        let wanted = |e: &scraper::ElementRef| {
            let text = element_text(e).to_lowercase();
            text.contains("english") || text.contains("auto")
        };
        let checked = |e: &scraper::ElementRef| {
            e.value().attr("aria-checked") == Some("true") || e.value().attr("aria-selected") == Some("true")
        };

        if options.iter().any(|e| wanted(e) && checked(e)) {
            return None;
        }

        return options
            .iter()
            .position(|e| element_text(e).to_lowercase().contains("english"))
            .or_else(|| options.iter().position(|e| wanted(e)))
            .map(|index| (css, index));
    }

    None
}
