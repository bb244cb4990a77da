//! Review result export
//!
//! Pure serialization of a [`ReviewResult`]; nothing here touches the engine.
//!
//! - **JSON**: machine-readable, round-trips to an equal result
//! - **Text**: plain report for terminals and logs
//! - **HTML**: self-contained page for sharing
//!
//! # Example
//!
//! ```no_run
//! use review_engine::reporter::{OutputFormat, Reporter};
//! # fn example(result: shared_types::ReviewResult) -> anyhow::Result<()> {
//! Reporter::new(OutputFormat::Html).write_to_file(&result, "review.html")?;
//! # Ok(())
//! # }
//! ```

mod html;
mod json;
mod text;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared_types::ReviewResult;

pub use html::HtmlReporter;
pub use json::JsonReporter;
pub use text::TextReporter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    #[default]
    JsonPretty,
    Text,
    Html,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json | Self::JsonPretty => "json",
            Self::Text => "txt",
            Self::Html => "html",
        }
    }
}

pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn format_result(&self, result: &ReviewResult) -> Result<String> {
        match self.format {
            OutputFormat::Json => JsonReporter::format(result, false),
            OutputFormat::JsonPretty => JsonReporter::format(result, true),
            OutputFormat::Text => TextReporter::format(result),
            OutputFormat::Html => HtmlReporter::format(result),
        }
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, result: &ReviewResult, path: P) -> Result<()> {
        let path = path.as_ref();
        let output = self.format_result(result)?;
        fs::write(path, output)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_dispatch() {
        let result = fixtures::sample_result();
        assert!(Reporter::new(OutputFormat::Json)
            .format_result(&result)
            .unwrap()
            .starts_with('{'));
        assert!(Reporter::new(OutputFormat::Text)
            .format_result(&result)
            .unwrap()
            .contains("REVIEW REPORT"));
        assert!(Reporter::new(OutputFormat::Html)
            .format_result(&result)
            .unwrap()
            .starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.json");
        Reporter::default()
            .write_to_file(&fixtures::sample_result(), &path)
            .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"compliance_score\": 62.5"));
    }
}
