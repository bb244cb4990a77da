//! Engine errors and the serializable failure attached to failed requests

use compliance_engine::ComplianceError;
use document_analyzer::AnalyzerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::RequestState;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Request not found: {request_id}")]
    NotFound { request_id: String },

    #[error("Request {request_id} is still {state}")]
    NotReady {
        request_id: String,
        state: RequestState,
    },

    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    Timeout { request_id: String, timeout_ms: u64 },

    #[error("Review queue is full ({capacity} pending)")]
    WorkerPoolExhausted { capacity: usize },

    #[error("Duplicate request id: {request_id}")]
    DuplicateRequest { request_id: String },

    #[error("Engine is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Analysis(#[from] AnalyzerError),

    #[error(transparent)]
    Compliance(#[from] ComplianceError),

    #[error("Internal error in request {request_id}: {detail}")]
    Internal { request_id: String, detail: String },
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::NotReady { .. } => "not_ready",
            Self::Timeout { .. } => "timeout",
            Self::WorkerPoolExhausted { .. } => "worker_pool_exhausted",
            Self::DuplicateRequest { .. } => "duplicate_request",
            Self::ShuttingDown => "shutting_down",
            Self::Analysis(e) => e.kind(),
            Self::Compliance(e) => e.kind(),
            Self::Internal { .. } => "internal",
        }
    }

    /// Transient conditions worth resubmitting under a fresh request id
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::WorkerPoolExhausted { .. })
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { request_id } => format!("No review with id '{}' is known", request_id),
            Self::NotReady { state, .. } => format!("The review is still {}", state),
            Self::Timeout { timeout_ms, .. } => {
                format!("The review did not finish within {}", describe_duration(*timeout_ms))
            }
            Self::WorkerPoolExhausted { .. } => "The review service is at capacity".to_string(),
            Self::DuplicateRequest { request_id } => {
                format!("A review with id '{}' was already submitted", request_id)
            }
            Self::ShuttingDown => "The review service is shutting down".to_string(),
            Self::Analysis(e) => e.user_message(),
            Self::Compliance(e) => e.user_message(),
            Self::Internal { .. } => "The review failed unexpectedly".to_string(),
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => {
                "Check the request id; finished reviews expire after the retention window"
            }
            Self::NotReady { .. } => "Poll the status again or subscribe to progress events",
            Self::Timeout { .. } => "Submit the document again, or split very large documents",
            Self::WorkerPoolExhausted { .. } => "Wait a moment and submit again",
            Self::DuplicateRequest { .. } => "Use a new request id",
            Self::ShuttingDown => "Submit again once the service is back",
            Self::Analysis(e) => e.suggestion(),
            Self::Compliance(e) => e.suggestion(),
            Self::Internal { .. } => "Submit again; report the request id if it keeps failing",
        }
    }

    pub fn to_failure(&self) -> ReviewFailure {
        ReviewFailure {
            kind: self.kind().to_string(),
            message: self.user_message(),
            suggestion: self.suggestion().to_string(),
            retryable: self.is_retryable(),
        }
    }
}

/// Why a request failed, as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFailure {
    pub kind: String,
    pub message: String,
    pub suggestion: String,
    pub retryable: bool,
}

fn describe_duration(ms: u64) -> String {
    if ms >= 1000 && ms % 1000 == 0 {
        format!("{} seconds", ms / 1000)
    } else {
        format!("{} ms", ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retryable_classification() {
        let timeout = EngineError::Timeout {
            request_id: "r1".into(),
            timeout_ms: 300_000,
        };
        assert!(timeout.is_retryable());
        assert!(EngineError::WorkerPoolExhausted { capacity: 64 }.is_retryable());

        let corrupt = EngineError::from(AnalyzerError::CorruptFile {
            filename: "a.pdf".into(),
            reason: "bad xref".into(),
        });
        assert!(!corrupt.is_retryable());
        assert_eq!(corrupt.kind(), "corrupt_file");
    }

    #[test]
    fn test_failure_hides_internal_detail() {
        let err = EngineError::from(AnalyzerError::CorruptFile {
            filename: "a.pdf".into(),
            reason: "xref offset 1234 out of range".into(),
        });
        let failure = err.to_failure();
        assert_eq!(failure.kind, "corrupt_file");
        assert!(!failure.message.contains("xref"));
        assert!(!failure.retryable);
    }

    #[test]
    fn test_timeout_failure_message() {
        let failure = EngineError::Timeout {
            request_id: "r1".into(),
            timeout_ms: 300_000,
        }
        .to_failure();
        assert_eq!(failure.message, "The review did not finish within 300 seconds");
        assert!(failure.retryable);
    }

    #[test]
    fn test_sub_second_timeout_message() {
        let short = EngineError::Timeout {
            request_id: "r1".into(),
            timeout_ms: 250,
        };
        assert_eq!(short.user_message(), "The review did not finish within 250 ms");

        let odd = EngineError::Timeout {
            request_id: "r1".into(),
            timeout_ms: 1_500,
        };
        assert_eq!(odd.user_message(), "The review did not finish within 1500 ms");
    }
}
