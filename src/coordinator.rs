/// Long-lived coordinator
///
/// Owns the page, the extractor slot and the batch run. Requests go to the
/// page-bound extractor; when it is absent (never installed, or destroyed by a
/// navigation) the coordinator installs a new one, waits for it to settle and
/// retries exactly once.
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::batch::{export_run, BatchProgress, BatchRun, ExportFormat, Messenger, Orchestrator, RunStore};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::extractor::{Absent, ExtractorHandle};
use crate::outline::CourseOutline;
use crate::page::Page;
use crate::probe::Availability;
use crate::protocol::{unexpected, PageIdentity, Payload, Request, Response};
use crate::transcript::Transcript;

pub struct Coordinator {
    page: Arc<dyn Page>,
    config: Config,
    extractor: Mutex<Option<ExtractorHandle>>,
    run: Mutex<Option<BatchRun>>,
    walking: AtomicBool,
    store: Arc<dyn RunStore>,
}

impl Coordinator {
    pub fn new(page: Arc<dyn Page>, config: Config, store: Arc<dyn RunStore>) -> Self {
        Self {
            page,
            config,
            extractor: Mutex::new(None),
            run: Mutex::new(None),
            walking: AtomicBool::new(false),
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn install(&self) -> Result<()> {
        let handle = ExtractorHandle::install(self.page.clone(), &self.config).await?;
        *self.extractor.lock().await = Some(handle);
        Ok(())
    }

    async fn try_send(&self, request: &Request) -> std::result::Result<Response, Absent> {
        // The slot lock is released before the request runs so overlapping
        // requests reach the extractor and get rejected there
        let handle = self.extractor.lock().await.clone();
        match handle {
            Some(handle) => handle.request(self.page.as_ref(), request.clone()).await,
            None => Err(Absent("extractor not installed".to_string())),
        }
    }

    pub async fn probe(&self) -> Result<Availability> {
        match self.send(Request::Probe).await? {
            Payload::Availability(availability) => Ok(availability),
            other => Err(unexpected("probe", &other)),
        }
    }

    /// Activate and extract the transcript of the current page
    pub async fn extract_current(&self) -> Result<Transcript> {
        match self.send(Request::Extract).await? {
            Payload::Transcript(transcript) => Ok(transcript),
            other => Err(unexpected("extract", &other)),
        }
    }

    pub async fn outline(&self) -> Result<CourseOutline> {
        match self.send(Request::GetOutline).await? {
            Payload::Outline(outline) => Ok(outline),
            other => Err(unexpected("get-outline", &other)),
        }
    }

    pub async fn identify(&self) -> Result<PageIdentity> {
        match self.send(Request::Identify).await? {
            Payload::Identity(identity) => Ok(identity),
            other => Err(unexpected("identify", &other)),
        }
    }

    /// Start a run over `lecture_ids`, replacing any previous run.
    ///
    /// The first id must be the lecture the page shows now. Titles come from
    /// the outline when one can be read.
    pub async fn start_batch(&self, lecture_ids: Vec<String>) -> Result<BatchProgress> {
        if let Some(first) = lecture_ids.first() {
            let identity = self.identify().await?;
            if let Some(actual) = identity.lecture_id.filter(|actual| actual != first) {
                return Err(EngineError::LectureMismatch {
                    expected: first.clone(),
                    actual,
                });
            }
        }

        let titles: HashMap<String, String> = match self.outline().await {
            Ok(outline) => outline
                .lectures()
                .map(|l| (l.id.clone(), l.title.clone()))
                .collect(),
            Err(e) => {
                debug!("No outline titles for batch: {}", e);
                HashMap::new()
            }
        };

        let run = BatchRun::new(lecture_ids, titles)?;
        info!("🚀 Starting batch over {} lectures", run.len());
        self.persist(&run).await;

        let progress = run.progress();
        *self.run.lock().await = Some(run);
        Ok(progress)
    }

    /// Start a run from the current lecture to the end of the course outline
    pub async fn start_batch_from_outline(&self) -> Result<BatchProgress> {
        let outline = self.outline().await?;
        let ids = match self.identify().await?.lecture_id {
            Some(current) if outline.lectures().any(|l| l.id == current) => outline.remaining_from(&current),
            _ => outline.remaining_from_current(),
        };
        self.start_batch(ids).await
    }

    /// Process one lecture.
    ///
    /// Rejected with `AlreadyProcessing` while another step or a `run_batch`
    /// walk is running.
    pub async fn advance_batch(&self) -> Result<BatchProgress> {
        if self.walking.load(Ordering::SeqCst) {
            return Err(EngineError::AlreadyProcessing);
        }
        let mut guard = self.run.try_lock().map_err(|_| EngineError::AlreadyProcessing)?;
        let run = guard.as_mut().ok_or(EngineError::NoActiveRun)?;

        let step = Orchestrator::new(self, &self.config.batch).advance(run).await;
        self.persist(run).await;
        step
    }

    /// Advance until the run finishes, saving after every step.
    ///
    /// The run is only locked for one lecture at a time so progress and
    /// exports can be read while the walk is going. A navigation timeout ends
    /// the run normally; only fatal errors are returned.
    pub async fn run_batch(&self) -> Result<BatchProgress> {
        if self.walking.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyProcessing);
        }
        let _walking = WalkingFlag(&self.walking);
        self.walk().await
    }

    async fn walk(&self) -> Result<BatchProgress> {
        let orchestrator = Orchestrator::new(self, &self.config.batch);

        loop {
            let mut guard = self.run.lock().await;
            let run = guard.as_mut().ok_or(EngineError::NoActiveRun)?;
            if run.is_finished() {
                let progress = run.progress();
                info!("✅ Batch finished: {}", progress.summary());
                return Ok(progress);
            }

            let step = orchestrator.advance(run).await;
            self.persist(run).await;
            drop(guard);

            match step {
                Ok(progress) => debug!("Batch progress: {}", progress.summary()),
                Err(EngineError::NavigationTimedOut(ms)) => {
                    warn!("⚠️ Navigation timed out after {} ms; keeping partial results", ms);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn batch_progress(&self) -> Option<BatchProgress> {
        self.run.lock().await.as_ref().map(BatchRun::progress)
    }

    pub async fn export_batch(&self, format: ExportFormat) -> Result<String> {
        let guard = self.run.lock().await;
        let run = guard.as_ref().ok_or(EngineError::NoActiveRun)?;
        export_run(run, format, Utc::now())
    }

    /// Drop the run and its persisted copy
    pub async fn reset_batch(&self) -> Result<()> {
        *self.run.lock().await = None;
        self.store.clear().await?;
        info!("🧹 Batch run reset");
        Ok(())
    }

    /// Pick up an unfinished run from the store
    pub async fn resume_batch(&self) -> Result<Option<BatchProgress>> {
        let Some(run) = self.store.load().await? else {
            return Ok(None);
        };
        if run.is_finished() {
            debug!("Stored run already finished; not resuming");
            return Ok(None);
        }

        info!("🔄 Resuming batch at lecture {}/{}", run.current_index + 1, run.len());
        let progress = run.progress();
        *self.run.lock().await = Some(run);
        Ok(Some(progress))
    }

    async fn persist(&self, run: &BatchRun) {
        if let Err(e) = self.store.save(run).await {
            warn!("⚠️ Failed to save run state: {}", e);
        }
    }
}

/// Clears the walking flag however `run_batch` exits
struct WalkingFlag<'a>(&'a AtomicBool);

impl Drop for WalkingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Messenger for Coordinator {
    async fn send(&self, request: Request) -> Result<Payload> {
        match self.try_send(&request).await {
            Ok(response) => return response.into_result(),
            Err(Absent(reason)) => debug!("{}; installing extractor", reason),
        }

        if let Err(e) = self.install().await {
            warn!("⚠️ Extractor install failed: {}", e);
            *self.extractor.lock().await = None;
        }
        tokio::time::sleep(self.config.protocol.install_settle()).await;

        match self.try_send(&request).await {
            Ok(response) => response.into_result(),
            Err(Absent(reason)) => Err(EngineError::ExtractorUnreachable(reason)),
        }
    }
}
