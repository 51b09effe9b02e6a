/// Batch collection orchestrator
///
/// One `advance` is one lecture: make sure the page shows it (clicking "next"
/// as often as needed), probe, then collect or skip. A lecture that fails or
/// cannot be reached is recorded and the walk goes on; a navigation timeout or
/// an unreachable extractor ends the run and keeps what was collected so far.
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{BatchItemStatus, BatchProgress, BatchRun, EndReason};
use crate::config::BatchConfig;
use crate::error::{EngineError, Result};
use crate::poll::poll_until;
use crate::protocol::{unexpected, PageIdentity, Payload, Request};

/// Anything that can carry a request to the page-bound extractor
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, request: Request) -> Result<Payload>;
}

pub struct Orchestrator<'a> {
    messenger: &'a dyn Messenger,
    config: &'a BatchConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(messenger: &'a dyn Messenger, config: &'a BatchConfig) -> Self {
        Self { messenger, config }
    }

    /// Process the lecture at the run's current index
    pub async fn advance(&self, run: &mut BatchRun) -> Result<BatchProgress> {
        let Some(lecture_id) = run.current_id().map(str::to_string) else {
            return Err(EngineError::RunFinished);
        };

        info!(
            "📄 Lecture {}/{}: {}",
            run.current_index + 1,
            run.len(),
            run.titles.get(&lecture_id).map(String::as_str).unwrap_or(&lecture_id)
        );

        let located = if run.arrived {
            self.confirm_arrival(&lecture_id).await
        } else {
            self.navigate(&lecture_id).await
        };

        match located {
            Ok(()) => run.arrived = true,
            Err(e @ EngineError::LectureMismatch { .. }) => {
                warn!("⚠️ Could not reach lecture {}: {}", lecture_id, e);
                ensure_collecting(run, &lecture_id)?;
                run.record_failure(&lecture_id, &e.to_string())?;
                run.step_forward();
                return Ok(run.progress());
            }
            Err(e) => {
                warn!("⚠️ Batch stopped before lecture {}: {}", lecture_id, e);
                if e.is_fatal() {
                    run.finish(EndReason::ExtractorUnreachable);
                    return Err(e);
                }
                run.finish(EndReason::NavigationTimedOut);
                return Err(EngineError::NavigationTimedOut(self.config.navigation_timeout_ms));
            }
        }

        if let Err(e) = self.collect(run, &lecture_id).await {
            warn!("⚠️ Batch stopped at lecture {}: {}", lecture_id, e);
            if e.is_fatal() {
                run.finish(EndReason::ExtractorUnreachable);
            }
            return Err(e);
        }

        run.step_forward();
        Ok(run.progress())
    }

    async fn identify(&self) -> Result<PageIdentity> {
        match self.messenger.send(Request::Identify).await? {
            Payload::Identity(identity) => Ok(identity),
            other => Err(unexpected("identify", &other)),
        }
    }

    /// Re-check a lecture the run believes it is already on
    async fn confirm_arrival(&self, expected_id: &str) -> Result<()> {
        let identity = self.identify().await?;
        match identity.lecture_id.as_deref() {
            Some(actual) if actual != expected_id => {
                debug!("Page shows lecture {} instead of {}; walking forward", actual, expected_id);
                self.navigate(expected_id).await
            }
            _ => Ok(()),
        }
    }

    /// Click "next" until the page shows `expected_id`, at most
    /// `max_navigation_hops` times. Lectures passed on the way are ignored.
    async fn navigate(&self, expected_id: &str) -> Result<()> {
        let mut current = self.identify().await?;
        let mut hops = 0;

        loop {
            match current.lecture_id.as_deref() {
                Some(actual) if actual == expected_id => {
                    debug!("On lecture {} after {} hops ({})", expected_id, hops, current.url);
                    return Ok(());
                }
                None if hops > 0 => {
                    debug!("Page {} has no lecture id; taking it as {}", current.url, expected_id);
                    return Ok(());
                }
                Some(actual) if hops > 0 => debug!("Passing lecture {} on the way to {}", actual, expected_id),
                _ => {}
            }

            if hops == self.config.max_navigation_hops {
                return Err(EngineError::LectureMismatch {
                    expected: expected_id.to_string(),
                    actual: current.lecture_id.unwrap_or_else(|| current.url.to_string()),
                });
            }

            current = self.step_next(&current).await?;
            hops += 1;
        }
    }

    /// Click "next" once and wait for the page identity to change
    async fn step_next(&self, before: &PageIdentity) -> Result<PageIdentity> {
        let timeout_ms = self.config.navigation_timeout_ms;

        match self.messenger.send(Request::NavigateNext).await? {
            Payload::Navigation { clicked: true } => {}
            Payload::Navigation { clicked: false } => {
                warn!("⚠️ No next-lecture control to click");
                return Err(EngineError::NavigationTimedOut(timeout_ms));
            }
            other => return Err(unexpected("navigate-next", &other)),
        }

        let messenger = self.messenger;
        let changed = poll_until(self.config.navigation_poll(), self.config.navigation_timeout(), move || async move {
            match messenger.send(Request::Identify).await {
                Ok(Payload::Identity(now)) if now.differs_from(before) => Some(Ok(now)),
                Err(e) if e.is_fatal() => Some(Err(e)),
                _ => None,
            }
        })
        .await;

        match changed {
            Some(result) => result,
            None => Err(EngineError::NavigationTimedOut(timeout_ms)),
        }
    }

/// Probe, then collect or skip. Only fatal errors are returned; everything
    /// else is recorded against the lecture.
    async fn collect(&self, run: &mut BatchRun, lecture_id: &str) -> Result<()> {
        let availability = match self.messenger.send(Request::Probe).await {
            Ok(Payload::Availability(availability)) => availability,
            Ok(other) => {
                let e = unexpected("probe", &other);
                ensure_collecting(run, lecture_id)?;
                return run.record_failure(lecture_id, &e.to_string());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("⚠️ Probe failed for lecture {}: {}", lecture_id, e);
                ensure_collecting(run, lecture_id)?;
                return run.record_failure(lecture_id, &e.to_string());
            }
        };

        if !availability.has_transcript {
            info!("⏭️ No transcript for lecture {}, skipping", lecture_id);
            return run.skip(lecture_id);
        }

        ensure_collecting(run, lecture_id)?;

        let request = Request::CollectCurrent {
            max_chars: self.config.max_transcript_chars,
        };
        match self.messenger.send(request).await {
            Ok(Payload::Collected(lecture)) => {
                info!(
                    "✅ Collected lecture {} ({} entries via {})",
                    lecture_id, lecture.entry_count, lecture.strategy
                );
                run.record_collected(lecture_id, lecture.text)
            }
            Ok(other) => run.record_failure(lecture_id, &unexpected("collect-current", &other).to_string()),
            Err(e) => {
                let failure = EngineError::ExtractionFailedForLecture {
                    lecture_id: lecture_id.to_string(),
                    reason: e.to_string(),
                };
                warn!("⚠️ {}", failure);
                run.record_failure(lecture_id, &e.to_string())?;

                if e.is_fatal() {
                    return Err(e);
                }
                Ok(())
            }
        }
    }
}

/// A run resumed mid-lecture already has the item in `collecting`
fn ensure_collecting(run: &mut BatchRun, lecture_id: &str) -> Result<()> {
    match run.status(lecture_id) {
        Some(BatchItemStatus::Collecting) => Ok(()),
        _ => run.begin(lecture_id),
    }
}
