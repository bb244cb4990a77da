//! Format-specific text extraction

pub(crate) mod pdf;
pub(crate) mod word;
pub(crate) mod xml;

use serde::{Deserialize, Serialize};
use shared_types::{DocumentMetadata, StructuralElement};

/// Outcome of one extraction backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub backend: String,
    /// Usable characters produced (0 on failure)
    pub characters: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ExtractionAttempt {
    pub(crate) fn failed(backend: &str, error: impl Into<String>) -> Self {
        Self {
            backend: backend.to_string(),
            characters: 0,
            error: Some(error.into()),
        }
    }
}

/// Raw extraction output shared by all formats
#[derive(Debug, Clone)]
pub(crate) struct Extracted {
    /// Un-normalized text per page
    pub pages: Vec<String>,
    pub elements: Vec<StructuralElement>,
    pub metadata: DocumentMetadata,
    pub method: &'static str,
    pub attempts: Vec<ExtractionAttempt>,
}
