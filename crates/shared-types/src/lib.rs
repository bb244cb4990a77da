//! Data model shared by the analyzer, the template processor and the review engine.

pub mod document;
pub mod template;
pub mod types;

pub use document::{
    Document, DocumentFormat, DocumentMetadata, ElementKind, PageText, StructuralElement,
    StructuralRole, StructureSummary,
};
pub use template::{ContentCheck, Pattern, Requirement, Severity, Template};
pub use types::{ComplianceStatus, Finding, LocationHint, ReviewResult, ReviewSummary};
