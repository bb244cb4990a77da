//! Analyzed document model
//!
//! A [`Document`] is produced once by the analyzer and never mutated
//! afterwards. Uploading the same file again yields a new document id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
}

impl DocumentFormat {
    /// Resolve a format from a filename extension (case-insensitive)
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Text of a single page (1-indexed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub number: u32,
    pub text: String,
    /// Byte offset where this page begins in [`Document::text`]
    #[serde(default)]
    pub start_offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub subject: Option<String>,
    /// Producing application, when the file records one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub modified: Option<DateTime<Utc>>,
    pub page_count: u32,
    pub word_count: usize,
    pub character_count: usize,
    /// ISO 639-1 code ("en", "de") or "unknown"
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<String>,
    pub file_size: u64,
}

/// Kind of a detected structural element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Heading,
    Paragraph,
    Table,
    ListItem,
}

/// Where in the page layout an element lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralRole {
    #[default]
    Body,
    Header,
    Footer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralElement {
    pub kind: ElementKind,
    #[serde(default)]
    pub role: StructuralRole,
    pub text: String,
    /// Reading-order index within the document
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page: Option<u32>,
}

/// Line-level statistics gathered while classifying structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureSummary {
    pub total_lines: usize,
    pub non_empty_lines: usize,
    pub headings: usize,
    pub list_items: usize,
    pub tables: usize,
    pub has_tables: bool,
    /// Regulatory phrases found in the text, in first-seen order
    #[serde(default)]
    pub key_phrases: Vec<String>,
}

/// A fully analyzed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub format: DocumentFormat,
    pub size_bytes: u64,
    /// Normalized full text used for rule matching
    pub text: String,
    pub pages: Vec<PageText>,
    pub metadata: DocumentMetadata,
    pub elements: Vec<StructuralElement>,
    pub analyzed_at: DateTime<Utc>,
}

impl Document {
    /// Build a single-page document directly from text.
    ///
    /// Word and character counts are filled in; everything else is left empty.
    pub fn new(
        filename: impl Into<String>,
        format: DocumentFormat,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let size_bytes = text.len() as u64;
        let metadata = DocumentMetadata {
            page_count: 1,
            word_count: text.split_whitespace().count(),
            character_count: text.chars().count(),
            file_size: size_bytes,
            ..Default::default()
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            format,
            size_bytes,
            pages: vec![PageText {
                number: 1,
                text: text.clone(),
                start_offset: 0,
            }],
            text,
            metadata,
            elements: Vec::new(),
            analyzed_at: Utc::now(),
        }
    }

    /// Page holding byte `offset` of [`Document::text`]
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        if offset > self.text.len() {
            return None;
        }
        let idx = self.pages.partition_point(|page| page.start_offset <= offset);
        idx.checked_sub(1).map(|i| self.pages[i].number)
    }

    /// Elements carrying the given structural role, in reading order
    pub fn elements_with_role(
        &self,
        role: StructuralRole,
    ) -> impl Iterator<Item = &StructuralElement> {
        self.elements.iter().filter(move |element| element.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_filename() {
        assert_eq!(DocumentFormat::from_filename("doc.PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_filename("a.b.docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_filename("legacy.doc"), Some(DocumentFormat::Doc));
        assert_eq!(DocumentFormat::from_filename("notes.txt"), None);
        assert_eq!(DocumentFormat::from_filename("README"), None);
    }

    #[test]
    fn test_new_document_counts() {
        let doc = Document::new("a.pdf", DocumentFormat::Pdf, "EU Declaration of Conformity");
        assert_eq!(doc.metadata.word_count, 4);
        assert_eq!(doc.metadata.character_count, 28);
        assert_eq!(doc.pages.len(), 1);
    }

    #[test]
    fn test_page_at_uses_offsets() {
        // "CE" first occurs inside "since" on page 1 and as a word on page 2
        let mut doc = Document::new("a.pdf", DocumentFormat::Pdf, "since we started CE marking");
        doc.pages = vec![
            PageText {
                number: 1,
                text: "since we started".into(),
                start_offset: 0,
            },
            PageText {
                number: 2,
                text: "CE marking".into(),
                start_offset: 17,
            },
        ];
        assert_eq!(doc.page_at(0), Some(1));
        assert_eq!(doc.page_at(16), Some(1));
        assert_eq!(doc.page_at(17), Some(2));
        assert_eq!(doc.page_at(doc.text.len()), Some(2));
        assert_eq!(doc.page_at(doc.text.len() + 1), None);

        doc.pages.clear();
        assert_eq!(doc.page_at(0), None);
    }

    #[test]
    fn test_element_role_default_on_deserialize() {
        let json = r#"{"kind":"heading","text":"SCOPE","position":0}"#;
        let element: StructuralElement = serde_json::from_str(json).unwrap();
        assert_eq!(element.role, StructuralRole::Body);
        assert_eq!(element.page, None);
    }
}
