//! TOML template files
//!
//! A file holds one or more `[[templates]]` tables; requirements are nested
//! `[[templates.requirements]]` tables. Patterns are written as
//! `{ literal = "CE" }` or `{ regex = 'notified\s+body' }`.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use shared_types::Template;

use crate::store::TemplateStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub templates: Vec<Template>,
}

impl TemplateFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template file: {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("Invalid template file: {}", path.display()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse template TOML")
    }
}

impl TemplateStore {
    /// Register every template in a TOML file, returning how many were added
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<usize> {
        let path = path.as_ref();
        let file = TemplateFile::from_file(path)?;
        let count = file.templates.len();
        for template in file.templates {
            let id = template.id.clone();
            self.register_template(template)
                .with_context(|| format!("Template '{}' in {}", id, path.display()))?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shared_types::{ContentCheck, Pattern, Severity};
    use std::io::Write;

    const SAMPLE: &str = r#"
[[templates]]
id = "ce_only"
name = "CE only"
version = "0.1"

[[templates.requirements]]
id = "ce"
title = "CE Marking"
severity = "high"
weight = 5.0
patterns = [{ literal = "CE" }, { regex = 'ce\s+mark' }]
checks = [{ kind = "no_future_dates", message = "future" }]
"#;

    #[test]
    fn test_parse_template_file() {
        let file = TemplateFile::from_str(SAMPLE).unwrap();
        assert_eq!(file.templates.len(), 1);
        let requirement = &file.templates[0].requirements[0];
        assert_eq!(requirement.severity, Severity::High);
        assert_eq!(requirement.category, "general");
        assert!(requirement.required);
        assert_eq!(
            requirement.patterns,
            vec![Pattern::literal("CE"), Pattern::regex(r"ce\s+mark")]
        );
        assert_eq!(
            requirement.checks,
            vec![ContentCheck::NoFutureDates {
                message: "future".into()
            }]
        );
    }

    #[test]
    fn test_load_file_registers_templates() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(SAMPLE.as_bytes()).unwrap();

        let mut store = TemplateStore::new();
        assert_eq!(store.load_file(tmp.path()).unwrap(), 1);
        assert!(store.contains("ce_only"));
    }

    #[test]
    fn test_load_file_reports_invalid_pattern() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(SAMPLE.replace(r"ce\s+mark", "(ce").as_bytes()).unwrap();

        let err = TemplateStore::new().load_file(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("ce_only"));
    }

    #[test]
    fn test_missing_file() {
        let err = TemplateFile::from_file("/nonexistent/templates.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read template file"));
    }
}
