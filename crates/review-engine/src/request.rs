//! Review requests and their lifecycle

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use compliance_engine::ValidationOptions;
use document_analyzer::UploadedFile;
use serde::{Deserialize, Serialize};
use shared_types::ReviewResult;

use crate::error::ReviewFailure;

/// One document to review against one template
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub id: String,
    pub file: Arc<UploadedFile>,
    pub template_id: String,
    pub options: ValidationOptions,
    /// Overrides the engine's request timeout
    pub timeout: Option<Duration>,
}

impl ReviewRequest {
    pub fn new(file: UploadedFile, template_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file: Arc::new(file),
            template_id: template_id.into(),
            options: ValidationOptions::default(),
            timeout: None,
        }
    }

    /// Use a caller-chosen id instead of a generated one
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// `queued -> running -> completed | failed`, or `abandoned` by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Queued,
    Running,
    Completed,
    Failed,
    Abandoned,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress milestones reported while a request runs
pub mod progress {
    pub const QUEUED: u8 = 0;
    pub const PARSED: u8 = 33;
    pub const VALIDATED: u8 = 90;
    pub const PACKAGED: u8 = 100;
}

/// Point-in-time view of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub request_id: String,
    pub state: RequestState,
    /// 0-100
    pub progress: u8,
    pub filename: String,
    pub template_id: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ReviewFailure>,
}

/// Broadcast on every state or progress change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub request_id: String,
    pub state: RequestState,
    pub progress: u8,
}

/// Terminal outcome returned by `ReviewEngine::result`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Completed { result: ReviewResult },
    Failed { failure: ReviewFailure },
    Abandoned,
}

impl ReviewOutcome {
    pub fn result(&self) -> Option<&ReviewResult> {
        match self {
            Self::Completed { result } => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ReviewFailure> {
        match self {
            Self::Failed { failure } => Some(failure),
            _ => None,
        }
    }
}

/// Entry in the pending-queue snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub request_id: String,
    pub filename: String,
    pub template_id: String,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!RequestState::Queued.is_terminal());
        assert!(!RequestState::Running.is_terminal());
        assert!(RequestState::Completed.is_terminal());
        assert!(RequestState::Failed.is_terminal());
        assert!(RequestState::Abandoned.is_terminal());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = ReviewRequest::new(UploadedFile::new("a.pdf", vec![]), "eu_doc");
        let b = ReviewRequest::new(UploadedFile::new("a.pdf", vec![]), "eu_doc");
        assert_ne!(a.id, b.id);
        assert_eq!(a.with_id("fixed").id, "fixed");
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&RequestState::Abandoned).unwrap(), "\"abandoned\"");
    }
}
