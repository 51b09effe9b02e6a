/// Live page driver backed by plain HTTP fetches
///
/// Scripts never run, so gestures are limited: clicking a link follows it,
/// clicking anything else is a no-op, and caption tracks are loaded by
/// fetching the `<track src>` WebVTT file when a track is enabled.
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::{parse_track_elements, selector, Page, TextTrack, TrackCue, TrackMode};
use crate::config::HttpConfig;
use crate::transcript::parse_webvtt;

#[derive(Debug)]
struct LoadedPage {
    url: Url,
    html: String,
    tracks: Vec<TextTrack>,
}

/// Page fetched over HTTP
pub struct HttpPage {
    client: Client,
    loaded: RwLock<LoadedPage>,
    generation: AtomicU64,
}

impl HttpPage {
    /// Fetch `url` and wrap the result as a page
    pub async fn open(url: &str, config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| Client::new());

        let url = Url::parse(url)?;
        let loaded = fetch_page(&client, url).await?;

        Ok(Self {
            client,
            loaded: RwLock::new(loaded),
            generation: AtomicU64::new(0),
        })
    }

    async fn navigate(&self, target: Url) -> Result<()> {
        info!("🌐 Following link to {}", target);
        let loaded = fetch_page(&self.client, target).await?;
        *self.loaded.write().await = loaded;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_cues(&self, src: &str) -> Result<Vec<TrackCue>> {
        debug!("Fetching caption track: {}", src);
        let response = self.client.get(src).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("caption track request failed with {}", response.status()));
        }

        let body = response.text().await?;
        let cues = parse_webvtt(&body)?
            .into_iter()
            .map(|cue| TrackCue {
                start_seconds: cue.start.as_secs_f64(),
                end_seconds: cue.end.as_secs_f64(),
                text: cue.text,
            })
            .collect();
        Ok(cues)
    }
}

async fn fetch_page(client: &Client, url: Url) -> Result<LoadedPage> {
    info!("🔍 Fetching page: {}", url);
    let response = client.get(url.clone()).send().await?;
    if !response.status().is_success() {
        return Err(anyhow!("HTTP {} for {}", response.status(), url));
    }

    // Redirects may move us; the final URL is the page identity
    let final_url = response.url().clone();
    let html = response.text().await?;
    let tracks = parse_track_elements(&Html::parse_document(&html), &final_url);
    debug!("Loaded {} bytes, {} text tracks", html.len(), tracks.len());

    Ok(LoadedPage {
        url: final_url,
        html,
        tracks,
    })
}

#[async_trait]
impl Page for HttpPage {
    async fn url(&self) -> Result<Url> {
        Ok(self.loaded.read().await.url.clone())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.loaded.read().await.html.clone())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn hover(&self, css: &str) -> Result<bool> {
        let loaded = self.loaded.read().await;
        let document = Html::parse_document(&loaded.html);
        Ok(selector(css).map(|s| document.select(&s).next().is_some()).unwrap_or(false))
    }

    async fn click_nth(&self, css: &str, index: usize) -> Result<bool> {
        let (found, href) = {
            let loaded = self.loaded.read().await;
            let document = Html::parse_document(&loaded.html);
            let element = selector(css).and_then(|s| document.select(&s).nth(index));
            match element {
                Some(element) => {
                    let href = element
                        .value()
                        .attr("href")
                        .and_then(|href| loaded.url.join(href).ok());
                    (true, href)
                }
                None => (false, None),
            }
        };

        if let Some(target) = href {
            self.navigate(target).await?;
        } else if found {
            debug!("Click on '{}' has no effect on a static page", css);
        }

        Ok(found)
    }

    async fn text_tracks(&self) -> Result<Vec<TextTrack>> {
        Ok(self.loaded.read().await.tracks.clone())
    }

    async fn set_track_mode(&self, index: usize, mode: TrackMode) -> Result<()> {
        let src = {
            let mut loaded = self.loaded.write().await;
            let track = loaded
                .tracks
                .get_mut(index)
                .ok_or_else(|| anyhow!("no text track at index {}", index))?;
            track.mode = mode;
            if mode == TrackMode::Disabled || !track.cues.is_empty() {
                return Ok(());
            }
            track.src.clone()
        };

        let Some(src) = src else {
            return Ok(());
        };

        match self.load_cues(&src).await {
            Ok(cues) => {
                let mut loaded = self.loaded.write().await;
                if let Some(track) = loaded.tracks.get_mut(index) {
                    track.cues = cues;
                }
            }
            Err(e) => warn!("Failed to load caption track {}: {}", src, e),
        }

        Ok(())
    }
}
