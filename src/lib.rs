/// Coursescribe - transcript extraction for e-learning lecture pages
///
/// Detects whether a lecture page carries a transcript, activates and scrapes it
/// through a chain of fallback strategies, and walks whole courses collecting one
/// transcript per lecture.

pub mod activation;
pub mod api;
pub mod batch;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extraction;
pub mod extractor;
pub mod outline;
pub mod page;
pub mod platform;
pub mod poll;
pub mod probe;
pub mod protocol;
pub mod transcript;

// Re-export main types for easy access
pub use crate::api::{ApiResponse, EngineApi};
pub use crate::batch::{BatchItemStatus, BatchProgress, BatchRun, ExportFormat, FileRunStore, MemoryRunStore, RunStore};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::coordinator::Coordinator;
pub use crate::error::{EngineError, ErrorCode, Result};
pub use crate::outline::{CourseOutline, LectureUnit, SectionUnit};
pub use crate::page::{HttpPage, MemoryPage, Page};
pub use crate::platform::{Platform, PlatformExtractor};
pub use crate::probe::Availability;
pub use crate::transcript::{TimestampStyle, Transcript, TranscriptEntry};
