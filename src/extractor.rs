/// Page-bound extractor
///
/// A spawned task that owns the platform capability for one page generation and
/// serves [`Request`]s over an mpsc channel. When the page navigates the task
/// ends and the channel closes; the coordinator sees that as "absent" and
/// installs a fresh extractor. One request is serviced at a time: a request
/// arriving while another is in flight is rejected with `AlreadyProcessing`.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::page::Page;
use crate::platform::{self, PlatformExtractor};
use crate::probe::Availability;
use crate::protocol::{CollectedLecture, PageIdentity, Payload, Request, Response};
use crate::transcript::{truncate_with_marker, TimestampStyle, Transcript};

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// Why a request never reached a live extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absent(pub String);

/// Coordinator-side handle to a running extractor
#[derive(Clone)]
pub struct ExtractorHandle {
    tx: mpsc::Sender<Envelope>,
    busy: Arc<AtomicBool>,
    generation: u64,
}

impl ExtractorHandle {
    /// Spawn an extractor bound to the page's current generation
    pub async fn install(page: Arc<dyn Page>, config: &Config) -> Result<Self> {
        let url = page.url().await?;
        let generation = page.generation();
        let platform = platform::for_url(&url);

        info!(
            "🚀 Installing extractor for {} (generation {}, platform {})",
            url,
            generation,
            platform.as_ref().map(|p| p.platform().to_string()).unwrap_or_else(|| "unknown".into())
        );

        let (tx, rx) = mpsc::channel(config.protocol.channel_capacity);
        let busy = Arc::new(AtomicBool::new(false));

        let extractor = PageExtractor {
            page,
            platform,
            config: config.clone(),
            generation,
            busy: busy.clone(),
        };
        tokio::spawn(extractor.serve(rx));

        Ok(Self { tx, busy, generation })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the extractor can still receive requests
    pub fn is_alive(&self, page: &dyn Page) -> bool {
        !self.tx.is_closed() && page.generation() == self.generation
    }

    /// Deliver one request and wait for its response
    pub async fn request(&self, page: &dyn Page, request: Request) -> std::result::Result<Response, Absent> {
        if !self.is_alive(page) {
            return Err(Absent(format!("extractor for generation {} is gone", self.generation)));
        }

        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("Rejecting {} request: extractor busy", request.name());
            return Ok(Response::fail(&EngineError::AlreadyProcessing));
        }

        let (reply, response) = oneshot::channel();
        if self.tx.send(Envelope { request, reply }).await.is_err() {
            self.busy.store(false, Ordering::SeqCst);
            return Err(Absent("extractor channel closed".to_string()));
        }

        response.await.map_err(|_| {
            self.busy.store(false, Ordering::SeqCst);
            Absent("extractor went away before replying".to_string())
        })
    }
}

struct PageExtractor {
    page: Arc<dyn Page>,
    platform: Option<Box<dyn PlatformExtractor>>,
    config: Config,
    generation: u64,
    busy: Arc<AtomicBool>,
}

impl PageExtractor {
    fn is_current(&self) -> bool {
        self.page.generation() == self.generation
    }

    async fn serve(self, mut rx: mpsc::Receiver<Envelope>) {
        let watch_interval = self.config.activation.poll_interval();

        loop {
            tokio::select! {
                envelope = rx.recv() => {
                    let Some(envelope) = envelope else {
                        break;
                    };

                    if !self.is_current() {
                        // Dropping the envelope closes the reply; the sender reinstalls
                        break;
                    }

                    let response = match self.handle(&envelope.request).await {
                        Ok(payload) => Response::ok(payload),
                        Err(e) => {
                            debug!("{} request failed: {}", envelope.request.name(), e);
                            Response::fail(&e)
                        }
                    };

                    self.busy.store(false, Ordering::SeqCst);
                    let _ = envelope.reply.send(response);
                }
                _ = tokio::time::sleep(watch_interval) => {}
            }

            if !self.is_current() {
                break;
            }
        }

        self.busy.store(false, Ordering::SeqCst);
        debug!("Extractor for generation {} stopped", self.generation);
    }

    fn capability(&self) -> Result<&dyn PlatformExtractor> {
        match self.platform.as_deref() {
            Some(platform) => Ok(platform),
            None => Err(EngineError::UnsupportedPlatform("current page".to_string())),
        }
    }

    async fn handle(&self, request: &Request) -> Result<Payload> {
        let page = self.page.as_ref();

        match request {
            Request::Probe => {
                let availability = match &self.platform {
                    Some(platform) => platform.probe(page).await?,
                    None => Availability::unsupported(),
                };
                Ok(Payload::Availability(availability))
            }
            Request::Extract => Ok(Payload::Transcript(self.activate_and_extract().await?)),
            Request::GetOutline => Ok(Payload::Outline(self.capability()?.outline(page).await?)),
            Request::Identify => {
                let url = page.url().await?;
                let lecture_id = self.platform.as_ref().and_then(|p| p.lecture_id(&url));
                Ok(Payload::Identity(PageIdentity { url, lecture_id }))
            }
            Request::NavigateNext => {
                let selectors = self.capability()?.selectors();
                for next in selectors.next_button {
                    if page.click(next).await? {
                        debug!("Clicked next control '{}'", next);
                        return Ok(Payload::Navigation { clicked: true });
                    }
                }
                warn!("⚠️ No next-lecture control found on page");
                Ok(Payload::Navigation { clicked: false })
            }
            Request::CollectCurrent { max_chars } => {
                let transcript = self.activate_and_extract().await?;
                let style = if self.config.output.include_timestamps {
                    TimestampStyle::Bracketed
                } else {
                    TimestampStyle::Stripped
                };
                let (text, truncated) = truncate_with_marker(&transcript.to_text(style), *max_chars);
                if truncated {
                    warn!("⚠️ Transcript truncated at {} characters", max_chars);
                }

                Ok(Payload::Collected(CollectedLecture {
                    text,
                    entry_count: transcript.len(),
                    strategy: transcript.strategy,
                    truncated,
                }))
            }
        }
    }

    /// Activation failure is soft: extraction is attempted either way
    async fn activate_and_extract(&self) -> Result<Transcript> {
        let platform = self.capability()?;
        let page = self.page.as_ref();

        let report = platform.activate(page, &self.config.activation).await?;
        if !report.is_active() {
            debug!("Activation ended in {:?}, trying extraction anyway", report.state);
        }

        platform.extract(page, &self.config.extraction).await
    }
}
