/// Request/response messages between the coordinator and the page-bound extractor
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EngineError, ErrorCode, Result};
use crate::extraction::StrategyKind;
use crate::outline::CourseOutline;
use crate::probe::Availability;
use crate::transcript::Transcript;

/// Work the extractor performs against the current page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    Probe,
    /// Activate the panel and run the extraction chain
    Extract,
    GetOutline,
    /// Report the current URL and lecture id
    Identify,
    /// Press the player's "next lecture" control
    NavigateNext,
    /// Extract and render as plain text capped at `max_chars`
    CollectCurrent { max_chars: usize },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Probe => "probe",
            Request::Extract => "extract",
            Request::GetOutline => "get-outline",
            Request::Identify => "identify",
            Request::NavigateNext => "navigate-next",
            Request::CollectCurrent { .. } => "collect-current",
        }
    }
}

/// Where the page currently is
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageIdentity {
    pub url: Url,
    pub lecture_id: Option<String>,
}

impl PageIdentity {
    /// A page change is confirmed by a different URL or a different lecture id
    pub fn differs_from(&self, other: &PageIdentity) -> bool {
        self.url != other.url || self.lecture_id != other.lecture_id
    }
}

/// Rendered transcript of the current lecture
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectedLecture {
    pub text: String,
    pub entry_count: usize,
    pub strategy: StrategyKind,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Payload {
    Availability(Availability),
    Transcript(Transcript),
    Outline(CourseOutline),
    Identity(PageIdentity),
    Navigation { clicked: bool },
    Collected(CollectedLecture),
}

/// Error half of a response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolFault {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolFault>,
}

impl Response {
    pub fn ok(payload: Payload) -> Self {
        Self {
            success: true,
            data: Some(payload),
            error: None,
        }
    }

    pub fn fail(error: &EngineError) -> Self {
        let message = match error {
            // The typed variants rebuild their own message from the code
            EngineError::UnsupportedPlatform(host) => host.clone(),
            EngineError::ExtractorUnreachable(reason) => reason.clone(),
            EngineError::ExtractionFailedForLecture { reason, .. } => reason.clone(),
            other => other.to_string(),
        };

        Self {
            success: false,
            data: None,
            error: Some(ProtocolFault {
                code: error.code(),
                message,
            }),
        }
    }

    pub fn into_result(self) -> Result<Payload> {
        match (self.success, self.data, self.error) {
            (true, Some(payload), _) => Ok(payload),
            (_, _, Some(fault)) => Err(EngineError::from_wire(fault.code, fault.message)),
            _ => Err(EngineError::Protocol("response carried neither data nor error".to_string())),
        }
    }
}

/// Unexpected payload for a request
pub fn unexpected(request: &str, payload: &Payload) -> EngineError {
    let kind = match payload {
        Payload::Availability(_) => "availability",
        Payload::Transcript(_) => "transcript",
        Payload::Outline(_) => "outline",
        Payload::Identity(_) => "identity",
        Payload::Navigation { .. } => "navigation",
        Payload::Collected(_) => "collected",
    };
    EngineError::Protocol(format!("unexpected {} payload for {} request", kind, request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_string(&Request::CollectCurrent { max_chars: 100 }).unwrap();
        assert_eq!(json, r#"{"type":"collect-current","max_chars":100}"#);

        let parsed: Request = serde_json::from_str(r#"{"type":"get-outline"}"#).unwrap();
        assert_eq!(parsed, Request::GetOutline);
        assert_eq!(parsed.name(), "get-outline");
    }

    #[test]
    fn test_response_success_shape() {
        let response = Response::ok(Payload::Availability(Availability {
            platform: Platform::Udemy,
            has_transcript: true,
            is_supported_page: true,
        }));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["data"]["value"]["platform"], "udemy");
    }

    #[test]
    fn test_typed_error_survives_the_hop() {
        let response = Response::fail(&EngineError::NoTranscriptContent);
        let json = serde_json::to_string(&response).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();

        assert!(!back.success);
        assert!(matches!(back.into_result(), Err(EngineError::NoTranscriptContent)));

        let busy = Response::fail(&EngineError::AlreadyProcessing);
        assert!(matches!(busy.into_result(), Err(EngineError::AlreadyProcessing)));
    }

    #[test]
    fn test_identity_comparison() {
        let a = PageIdentity {
            url: Url::parse("https://www.udemy.com/course/rust/learn/lecture/1").unwrap(),
            lecture_id: Some("1".into()),
        };
        let mut b = a.clone();
        assert!(!a.differs_from(&b));

        b.url = Url::parse("https://www.udemy.com/course/rust/learn/lecture/1#overview").unwrap();
        assert!(a.differs_from(&b));
    }
}
