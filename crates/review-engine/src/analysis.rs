//! Seam between the engine and document analysis

use document_analyzer::{AnalysisResult, AnalyzerError, DocumentAnalyzer, UploadedFile};

/// Anything that can turn an uploaded file into an analyzed document.
///
/// Called from blocking threads, so implementations may do CPU-heavy work.
pub trait DocumentAnalysis: Send + Sync + 'static {
    fn analyze(&self, file: &UploadedFile) -> Result<AnalysisResult, AnalyzerError>;
}

impl DocumentAnalysis for DocumentAnalyzer {
    fn analyze(&self, file: &UploadedFile) -> Result<AnalysisResult, AnalyzerError> {
        DocumentAnalyzer::analyze(self, file)
    }
}
