//! Template-driven compliance validation
//!
//! Templates are registered once in a [`TemplateStore`], which validates them
//! and compiles their patterns. A [`TemplateProcessor`] then checks analyzed
//! documents against a template and produces findings, a weighted score and
//! an overall status derived from a configurable [`StatusPolicy`].
//!
//! ```
//! use std::sync::Arc;
//! use compliance_engine::{
//!     TemplateProcessor, TemplateStore, ValidationOptions, EU_DOC_TEMPLATE_ID,
//! };
//! use shared_types::{Document, DocumentFormat};
//!
//! let store = Arc::new(TemplateStore::with_builtin().unwrap());
//! let processor = TemplateProcessor::new(store);
//! let doc = Document::new("doc.pdf", DocumentFormat::Pdf, "EU Declaration of Conformity ...");
//! let result = processor
//!     .validate(&doc, EU_DOC_TEMPLATE_ID, &ValidationOptions::default())
//!     .unwrap();
//! assert!(result.compliance_score < 100.0);
//! ```

pub mod builtin;
pub mod checks;
pub mod error;
pub mod loader;
pub mod patterns;
pub mod policy;
pub mod processor;
pub mod recommendations;
pub mod scoring;
pub mod store;

pub use builtin::EU_DOC_TEMPLATE_ID;
pub use error::ComplianceError;
pub use loader::TemplateFile;
pub use policy::StatusPolicy;
pub use processor::{ProcessorStats, TemplateProcessor, ValidationOptions, ValidationResult};
pub use scoring::compute_score;
pub use store::{TemplateInfo, TemplateStore};
