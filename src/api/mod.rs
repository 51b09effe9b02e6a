//! Presentation-facing API
//!
//! Every operation the UI can trigger, each answered with an [`ApiResponse`]
//! so failures reach the caller as data instead of errors.

use std::sync::Arc;
use tracing::info;

use crate::batch::{BatchProgress, ExportFormat, RunStore};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::outline::CourseOutline;
use crate::page::Page;
use crate::probe::Availability;
use crate::transcript::Transcript;

pub mod models;

pub use models::{ApiResponse, ExportApiInfo};

pub struct EngineApi {
    coordinator: Coordinator,
}

impl EngineApi {
    pub fn new(page: Arc<dyn Page>, config: Config, store: Arc<dyn RunStore>) -> Self {
        info!("🚀 Engine API ready");
        Self {
            coordinator: Coordinator::new(page, config, store),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub async fn probe_availability(&self) -> ApiResponse<Availability> {
        ApiResponse::from_result(self.coordinator.probe().await)
    }

    pub async fn extract_current_transcript(&self) -> ApiResponse<Transcript> {
        ApiResponse::from_result(self.coordinator.extract_current().await)
    }

    pub async fn get_outline(&self) -> ApiResponse<CourseOutline> {
        ApiResponse::from_result(self.coordinator.outline().await)
    }

    pub async fn start_batch(&self, lecture_ids: Vec<String>) -> ApiResponse<BatchProgress> {
        ApiResponse::from_result(self.coordinator.start_batch(lecture_ids).await)
    }

    pub async fn advance_batch(&self) -> ApiResponse<BatchProgress> {
        ApiResponse::from_result(self.coordinator.advance_batch().await)
    }

    pub async fn export_batch(&self, format: ExportFormat) -> ApiResponse<ExportApiInfo> {
        ApiResponse::from_result(
            self.coordinator
                .export_batch(format)
                .await
                .map(|content| ExportApiInfo { format, content }),
        )
    }
}
