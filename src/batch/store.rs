/// Run state persistence
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::BatchRun;
use crate::error::Result;

/// Where a batch run is mirrored between steps
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn load(&self) -> Result<Option<BatchRun>>;

    async fn save(&self, run: &BatchRun) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// One pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct FileRunStore {
    path: PathBuf,
}

impl FileRunStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn load(&self) -> Result<Option<BatchRun>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;
        let run: BatchRun = serde_json::from_str(&content)?;
        debug!("📁 Loaded run state from {}", self.path.display());
        Ok(Some(run))
    }

    async fn save(&self, run: &BatchRun) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        // Write then rename so a crash never leaves half a file behind
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(run)?).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!("💾 Saved run state to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if fs::try_exists(&self.path).await? {
            fs::remove_file(&self.path).await?;
            info!("🧹 Cleared run state at {}", self.path.display());
        }
        Ok(())
    }
}

/// Keeps the run in memory only
#[derive(Debug, Clone, Default)]
pub struct MemoryRunStore {
    run: Arc<RwLock<Option<BatchRun>>>,
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn load(&self) -> Result<Option<BatchRun>> {
        Ok(self.run.read().await.clone())
    }

    async fn save(&self, run: &BatchRun) -> Result<()> {
        *self.run.write().await = Some(run.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.run.write().await = None;
        Ok(())
    }
}
