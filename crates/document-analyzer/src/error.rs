//! Analyzer error taxonomy

use thiserror::Error;

/// Errors raised while turning an uploaded file into a [`shared_types::Document`].
///
/// Extraction is all-or-nothing: any of these means no text was returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("Unsupported format for '{filename}': {detail}")]
    UnsupportedFormat { filename: String, detail: String },

    #[error("Corrupt file '{filename}': {reason}")]
    CorruptFile { filename: String, reason: String },

    #[error("File '{filename}' is {size} bytes, limit is {limit} bytes")]
    SizeLimitExceeded {
        filename: String,
        size: u64,
        limit: u64,
    },

    #[error("Password-protected document: {filename}")]
    PasswordProtected { filename: String },

    #[error("No extractable text in '{filename}' - OCR required")]
    NoTextContent { filename: String },
}

impl AnalyzerError {
    pub(crate) fn corrupt(filename: &str, reason: impl Into<String>) -> Self {
        Self::CorruptFile {
            filename: filename.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(filename: &str, detail: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            filename: filename.to_string(),
            detail: detail.into(),
        }
    }

    /// Stable machine-readable identifier
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::CorruptFile { .. } => "corrupt_file",
            Self::SizeLimitExceeded { .. } => "size_limit_exceeded",
            Self::PasswordProtected { .. } => "password_protected",
            Self::NoTextContent { .. } => "no_text_content",
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            Self::UnsupportedFormat { filename, .. }
            | Self::CorruptFile { filename, .. }
            | Self::SizeLimitExceeded { filename, .. }
            | Self::PasswordProtected { filename }
            | Self::NoTextContent { filename } => filename,
        }
    }

    /// Short message suitable for an end user
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedFormat { filename, .. } => {
                format!("'{}' is not a supported document type", filename)
            }
            Self::CorruptFile { filename, .. } => {
                format!("'{}' could not be read", filename)
            }
            Self::SizeLimitExceeded { filename, limit, .. } => format!(
                "'{}' exceeds the {} MB upload limit",
                filename,
                limit / (1024 * 1024)
            ),
            Self::PasswordProtected { filename } => {
                format!("'{}' is password protected", filename)
            }
            Self::NoTextContent { filename } => {
                format!("'{}' contains no readable text", filename)
            }
        }
    }

    /// Corrective action for the user
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "Upload a PDF or Word (.docx) file",
            Self::CorruptFile { .. } => "Re-export the document from its source application",
            Self::SizeLimitExceeded { .. } => "Split the document or compress embedded images",
            Self::PasswordProtected { .. } => "Remove the password protection and upload again",
            Self::NoTextContent { .. } => "Run OCR on the scanned document before uploading",
        }
    }
}
