//! Document analysis for uploaded regulatory documents
//!
//! Turns PDF and Word files into an immutable [`Document`]: normalized text,
//! per-page text, metadata and detected structural elements.
//!
//! # Example
//! ```no_run
//! use document_analyzer::{AnalyzerConfig, DocumentAnalyzer, UploadedFile};
//!
//! let analyzer = DocumentAnalyzer::new(AnalyzerConfig::default());
//! let file = UploadedFile::from_path("declaration.pdf").unwrap();
//! let analysis = analyzer.analyze(&file).unwrap();
//! println!("{} words", analysis.document.metadata.word_count);
//! ```

pub mod error;
mod extract;
pub mod structure;
pub mod text;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared_types::{Document, DocumentFormat, PageText, StructureSummary};
use tracing::{info, instrument, warn};

pub use error::AnalyzerError;
pub use extract::ExtractionAttempt;

const BYTES_PER_MB: u64 = 1024 * 1024;

fn default_max_file_size_mb() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

/// Analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Collapse whitespace runs in the matching text
    #[serde(default = "default_true")]
    pub normalize_whitespace: bool,
    #[serde(default = "default_true")]
    pub detect_language: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            normalize_whitespace: true,
            detect_language: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }
}

/// A file handed in by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// How the text was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionInfo {
    /// Backend whose output was used
    pub method: String,
    pub attempts: Vec<ExtractionAttempt>,
}

/// Successful analysis of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub document: Document,
    pub structure: StructureSummary,
    pub extraction: ExtractionInfo,
    pub processing_ms: u64,
}

/// Cheap pre-flight check result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub is_compatible: bool,
    pub format: Option<DocumentFormat>,
    pub file_size_mb: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Running counters since the analyzer was created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerStats {
    pub documents_analyzed: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_processing_ms: u64,
}

impl AnalyzerStats {
    pub fn success_rate(&self) -> f64 {
        if self.documents_analyzed == 0 {
            return 0.0;
        }
        self.successful as f64 / self.documents_analyzed as f64
    }

    pub fn average_processing_ms(&self) -> f64 {
        if self.documents_analyzed == 0 {
            return 0.0;
        }
        self.total_processing_ms as f64 / self.documents_analyzed as f64
    }
}

#[derive(Default)]
struct Counters {
    analyzed: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    processing_ms: AtomicU64,
}

/// Extracts text and structure from PDF and Word documents.
///
/// Stateless apart from statistics, so one instance can be shared across
/// threads behind an `Arc`.
pub struct DocumentAnalyzer {
    config: AnalyzerConfig,
    counters: Counters,
}

impl DocumentAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze one file. Either the full document is returned or an error;
    /// partial text never escapes.
    #[instrument(skip(self, file), fields(filename = %file.filename, size = file.bytes.len()))]
    pub fn analyze(&self, file: &UploadedFile) -> Result<AnalysisResult, AnalyzerError> {
        let started = Instant::now();
        let outcome = self.analyze_inner(file, started);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        self.counters.analyzed.fetch_add(1, Ordering::Relaxed);
        self.counters.processing_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        match &outcome {
            Ok(result) => {
                self.counters.successful.fetch_add(1, Ordering::Relaxed);
                info!(
                    document_id = %result.document.id,
                    pages = result.document.pages.len(),
                    elements = result.document.elements.len(),
                    method = %result.extraction.method,
                    elapsed_ms,
                    "Document analyzed"
                );
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(kind = e.kind(), error = %e, elapsed_ms, "Document analysis failed");
            }
        }
        outcome
    }

    fn analyze_inner(
        &self,
        file: &UploadedFile,
        started: Instant,
    ) -> Result<AnalysisResult, AnalyzerError> {
        let format = self.check_format(file)?;
        self.check_size(file)?;

        if file.bytes.is_empty() {
            return Err(AnalyzerError::corrupt(&file.filename, "file is empty"));
        }

        let extracted = match format {
            DocumentFormat::Pdf => extract::pdf::extract(&file.filename, &file.bytes)?,
            DocumentFormat::Docx => {
                if !extract::word::is_zip_package(&file.bytes) {
                    return Err(AnalyzerError::corrupt(
                        &file.filename,
                        "not a ZIP-based Word package",
                    ));
                }
                extract::word::extract(&file.filename, &file.bytes)?
            }
            DocumentFormat::Doc => {
                if extract::word::is_ole_compound(&file.bytes) {
                    return Err(AnalyzerError::unsupported(
                        &file.filename,
                        "legacy binary Word format; save the file as .docx",
                    ));
                }
                if !extract::word::is_zip_package(&file.bytes) {
                    return Err(AnalyzerError::corrupt(
                        &file.filename,
                        "unrecognised Word file signature",
                    ));
                }
                extract::word::extract(&file.filename, &file.bytes)?
            }
        };

        let collapse = self.config.normalize_whitespace;
        let raw_text = extracted.pages.join("\n\n");
        let (text, pages) = assemble_pages(&extracted.pages, collapse);
        if text::non_whitespace_len(&text) == 0 {
            return Err(AnalyzerError::NoTextContent {
                filename: file.filename.clone(),
            });
        }

        let mut metadata = extracted.metadata;
        metadata.word_count = text::word_count(&text);
        metadata.character_count = text.chars().count();
        metadata.file_size = file.size();
        if self.config.detect_language {
            metadata.language = Some(text::detect_language(&text).to_string());
        }

        let structure = structure::summarize(&raw_text, &extracted.elements);

        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            filename: file.filename.clone(),
            format,
            size_bytes: file.size(),
            text,
            pages,
            metadata,
            elements: extracted.elements,
            analyzed_at: Utc::now(),
        };

        Ok(AnalysisResult {
            document,
            structure,
            extraction: ExtractionInfo {
                method: extracted.method.to_string(),
                attempts: extracted.attempts,
            },
            processing_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn check_format(&self, file: &UploadedFile) -> Result<DocumentFormat, AnalyzerError> {
        DocumentFormat::from_filename(&file.filename).ok_or_else(|| {
            let ext = file
                .filename
                .rsplit_once('.')
                .map(|(_, e)| format!(".{}", e))
                .unwrap_or_else(|| "no extension".to_string());
            AnalyzerError::unsupported(
                &file.filename,
                format!("{} is not one of .pdf, .docx, .doc", ext),
            )
        })
    }

    fn check_size(&self, file: &UploadedFile) -> Result<(), AnalyzerError> {
        let limit = self.config.max_file_size_bytes();
        if file.size() > limit {
            return Err(AnalyzerError::SizeLimitExceeded {
                filename: file.filename.clone(),
                size: file.size(),
                limit,
            });
        }
        Ok(())
    }

    /// Check format and size without extracting anything
    pub fn check_compatibility(&self, file: &UploadedFile) -> CompatibilityReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let format = match self.check_format(file) {
            Ok(format) => Some(format),
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };
        if let Err(e) = self.check_size(file) {
            errors.push(e.to_string());
        }

        match format {
            Some(DocumentFormat::Pdf) if !extract::pdf::looks_like_pdf(&file.bytes) => {
                errors.push("file does not start with a PDF header".to_string());
            }
            Some(DocumentFormat::Doc) if extract::word::is_ole_compound(&file.bytes) => {
                errors.push(
                    "legacy binary .doc files are not supported; save as .docx".to_string(),
                );
            }
            Some(DocumentFormat::Docx) if !extract::word::is_zip_package(&file.bytes) => {
                errors.push("file is not a ZIP-based Word package".to_string());
            }
            _ => {}
        }

        let size_mb = file.size() as f64 / BYTES_PER_MB as f64;
        if errors.is_empty() && size_mb > self.config.max_file_size_mb as f64 * 0.8 {
            warnings.push(format!(
                "file is close to the {} MB limit",
                self.config.max_file_size_mb
            ));
        }

        CompatibilityReport {
            is_compatible: errors.is_empty(),
            format,
            file_size_mb: size_mb,
            errors,
            warnings,
        }
    }

    pub fn stats(&self) -> AnalyzerStats {
        AnalyzerStats {
            documents_analyzed: self.counters.analyzed.load(Ordering::Relaxed),
            successful: self.counters.successful.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            total_processing_ms: self.counters.processing_ms.load(Ordering::Relaxed),
        }
    }
}

/// Normalize each page and join them into the matching text, recording
/// where every page starts so match offsets map back to page numbers.
fn assemble_pages(raw_pages: &[String], collapse: bool) -> (String, Vec<PageText>) {
    let separator = if collapse { " " } else { "\n\n" };
    let mut text = String::new();
    let mut pages = Vec::with_capacity(raw_pages.len());

    for (i, raw) in raw_pages.iter().enumerate() {
        let page_text = text::normalize(raw, collapse);
        if !page_text.is_empty() && !text.is_empty() {
            text.push_str(separator);
        }
        let start_offset = text.len();
        text.push_str(&page_text);
        pages.push(PageText {
            number: i as u32 + 1,
            text: page_text,
            start_offset,
        });
    }
    (text, pages)
}

impl Default for DocumentAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}
