use serde::{Deserialize, Serialize};

use crate::batch::BatchItemStatus;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error types for transcript extraction and batch collection
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("No transcript content found on this page")]
    NoTranscriptContent,

    #[error("Transcript panel did not activate within {0} ms")]
    ActivationTimedOut(u64),

    #[error("Extractor unreachable: {0}. Reload the page and try again")]
    ExtractorUnreachable(String),

    #[error("Page did not change within {0} ms")]
    NavigationTimedOut(u64),

    #[error("Expected lecture {expected} but the page shows {actual}")]
    LectureMismatch { expected: String, actual: String },

    #[error("Extraction failed for lecture {lecture_id}: {reason}")]
    ExtractionFailedForLecture { lecture_id: String, reason: String },

    #[error("Extractor is already processing a request")]
    AlreadyProcessing,

    #[error("Invalid status transition for {lecture_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        lecture_id: String,
        from: BatchItemStatus,
        to: BatchItemStatus,
    },

    #[error("No batch run is active")]
    NoActiveRun,

    #[error("Batch run has already finished")]
    RunFinished,

    #[error("Batch needs at least one lecture id")]
    EmptyBatch,

    #[error("Page driver error: {0}")]
    Driver(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Machine-readable error code carried across the request protocol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    UnsupportedPlatform,
    NoTranscriptContent,
    ActivationTimedOut,
    ExtractorUnreachable,
    NavigationTimedOut,
    LectureMismatch,
    ExtractionFailed,
    AlreadyProcessing,
    Internal,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::UnsupportedPlatform(_) => ErrorCode::UnsupportedPlatform,
            EngineError::NoTranscriptContent => ErrorCode::NoTranscriptContent,
            EngineError::ActivationTimedOut(_) => ErrorCode::ActivationTimedOut,
            EngineError::ExtractorUnreachable(_) => ErrorCode::ExtractorUnreachable,
            EngineError::NavigationTimedOut(_) => ErrorCode::NavigationTimedOut,
            EngineError::LectureMismatch { .. } => ErrorCode::LectureMismatch,
            EngineError::ExtractionFailedForLecture { .. } => ErrorCode::ExtractionFailed,
            EngineError::AlreadyProcessing => ErrorCode::AlreadyProcessing,
            _ => ErrorCode::Internal,
        }
    }

    /// Rebuild a typed error from its wire form
    pub fn from_wire(code: ErrorCode, message: String) -> Self {
        match code {
            ErrorCode::UnsupportedPlatform => EngineError::UnsupportedPlatform(message),
            ErrorCode::NoTranscriptContent => EngineError::NoTranscriptContent,
            ErrorCode::ActivationTimedOut => EngineError::ActivationTimedOut(0),
            ErrorCode::ExtractorUnreachable => EngineError::ExtractorUnreachable(message),
            ErrorCode::NavigationTimedOut => EngineError::NavigationTimedOut(0),
            ErrorCode::LectureMismatch => EngineError::LectureMismatch {
                expected: String::new(),
                actual: message,
            },
            ErrorCode::ExtractionFailed => EngineError::ExtractionFailedForLecture {
                lecture_id: String::new(),
                reason: message,
            },
            ErrorCode::AlreadyProcessing => EngineError::AlreadyProcessing,
            ErrorCode::Internal => EngineError::Protocol(message),
        }
    }

    /// Whether this failure should end the whole operation rather than one page
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::ExtractorUnreachable(_) | EngineError::UnsupportedPlatform(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        let err = EngineError::UnsupportedPlatform("example.com".to_string());
        let rebuilt = EngineError::from_wire(err.code(), "example.com".to_string());
        assert!(matches!(rebuilt, EngineError::UnsupportedPlatform(ref host) if host == "example.com"));

        let rebuilt = EngineError::from_wire(ErrorCode::NoTranscriptContent, String::new());
        assert!(matches!(rebuilt, EngineError::NoTranscriptContent));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::ExtractorUnreachable("gone".into()).is_fatal());
        assert!(!EngineError::NoTranscriptContent.is_fatal());
        assert!(!EngineError::NavigationTimedOut(500).is_fatal());

        let mismatch = EngineError::LectureMismatch {
            expected: "12".into(),
            actual: "14".into(),
        };
        assert!(!mismatch.is_fatal());
        assert_eq!(mismatch.code(), ErrorCode::LectureMismatch);
        assert_eq!(mismatch.to_string(), "Expected lecture 12 but the page shows 14");
    }
}
