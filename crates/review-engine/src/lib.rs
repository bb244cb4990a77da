//! Automated document review
//!
//! Ties the [`document_analyzer`] and [`compliance_engine`] crates together:
//!
//! - [`ReviewEngine`]: a bounded asynchronous queue with a fixed worker pool,
//!   per-request timeouts, progress events and time-limited result retention
//! - [`workflow::WorkflowManager`]: multi-step workflows (analyze, validate,
//!   check, export, host hooks) with dependency ordering
//! - [`reporter`]: JSON, text and HTML export of review results
//!
//! # Example
//!
//! ```no_run
//! use review_engine::{EngineConfig, ReviewEngine, ReviewOutcome, ReviewRequest};
//! use document_analyzer::UploadedFile;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = ReviewEngine::from_config(&EngineConfig::default())?;
//! let file = UploadedFile::from_path("declaration.pdf")?;
//! let id = engine.submit(ReviewRequest::new(file, "eu_doc")).await?;
//!
//! if let ReviewOutcome::Completed { result } = engine.wait(&id).await? {
//!     println!("{}: {:.1}%", result.status, result.compliance_score);
//! }
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod reporter;
pub mod request;
pub mod workflow;

pub use analysis::DocumentAnalysis;
pub use config::{EngineConfig, EngineSettings, TemplateSettings};
pub use engine::{package, EngineStats, ReviewEngine};
pub use error::{EngineError, ReviewFailure};
pub use request::{
    ProgressEvent, QueuedRequest, RequestState, RequestStatus, ReviewOutcome, ReviewRequest,
};
