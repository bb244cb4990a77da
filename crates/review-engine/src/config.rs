//! Engine configuration loaded from TOML
//!
//! ```toml
//! [engine]
//! worker_count = 3
//! queue_capacity = 64
//! request_timeout_ms = 300000
//!
//! [analyzer]
//! max_file_size_mb = 50
//!
//! [policy]
//! high = "failed"
//!
//! [templates]
//! include_builtin = true
//! paths = ["templates/fda.toml"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context};
use compliance_engine::{StatusPolicy, TemplateStore};
use document_analyzer::AnalyzerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub policy: StatusPolicy,
    #[serde(default)]
    pub templates: TemplateSettings,
}

/// Worker pool and request lifecycle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Wall-clock limit for one review, from dequeue to packaged result
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How long finished requests stay retrievable
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSettings {
    #[serde(default = "default_true")]
    pub include_builtin: bool,
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

fn default_worker_count() -> usize {
    3
}

fn default_queue_capacity() -> usize {
    64
}

fn default_request_timeout_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_retention_ms() -> u64 {
    3_600_000
}

fn default_sweep_interval_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            request_timeout_ms: default_request_timeout_ms(),
            retention_ms: default_retention_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl EngineSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            include_builtin: true,
            paths: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse engine config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.engine.worker_count > 0, "engine.worker_count must be at least 1");
        ensure!(self.engine.queue_capacity > 0, "engine.queue_capacity must be at least 1");
        ensure!(self.engine.request_timeout_ms > 0, "engine.request_timeout_ms must be positive");
        ensure!(self.engine.sweep_interval_ms > 0, "engine.sweep_interval_ms must be positive");
        ensure!(self.analyzer.max_file_size_mb > 0, "analyzer.max_file_size_mb must be positive");
        ensure!(
            self.templates.include_builtin || !self.templates.paths.is_empty(),
            "no templates configured: enable include_builtin or list template paths"
        );
        Ok(())
    }

    /// Build the template store described by `[templates]`
    pub fn build_store(&self) -> anyhow::Result<TemplateStore> {
        let mut store = if self.templates.include_builtin {
            TemplateStore::with_builtin().context("Built-in templates failed to load")?
        } else {
            TemplateStore::new()
        };
        for path in &self.templates.paths {
            store.load_file(path)?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_engine::EU_DOC_TEMPLATE_ID;
    use pretty_assertions::assert_eq;
    use shared_types::{ComplianceStatus, Severity};
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.engine.worker_count, 3);
        assert_eq!(config.engine.queue_capacity, 64);
        assert_eq!(config.engine.request_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_str(
            r#"
            [engine]
            worker_count = 8

            [analyzer]
            max_file_size_mb = 10

            [policy]
            medium = "warning"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.worker_count, 8);
        assert_eq!(config.engine.queue_capacity, 64);
        assert_eq!(config.analyzer.max_file_size_mb, 10);
        assert!(config.analyzer.normalize_whitespace);
        assert_eq!(config.policy.medium, ComplianceStatus::Warning);
        assert_eq!(config.policy.status_for(Severity::Critical), ComplianceStatus::Failed);
    }

    #[test]
    fn test_rejects_configurable_critical_status() {
        let err = EngineConfig::from_str("[policy]\ncritical = \"passed\"").unwrap_err();
        assert!(format!("{:#}", err).contains("critical"), "{:#}", err);
    }

    #[test]
    fn test_rejects_zero_workers() {
        let err = EngineConfig::from_str("[engine]\nworker_count = 0").unwrap_err();
        assert!(err.to_string().contains("worker_count"));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(EngineConfig::from_str("[engine\nworker_count = 1").is_err());
    }

    #[test]
    fn test_build_store_with_extra_templates() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
[[templates]]
id = "extra"
name = "Extra"
version = "1"

[[templates.requirements]]
id = "ce"
title = "CE"
severity = "low"
patterns = [{{ literal = "CE" }}]
"#
        )
        .unwrap();

        let config = EngineConfig {
            templates: TemplateSettings {
                include_builtin: true,
                paths: vec![tmp.path().to_path_buf()],
            },
            ..Default::default()
        };
        let store = config.build_store().unwrap();
        assert!(store.contains(EU_DOC_TEMPLATE_ID));
        assert!(store.contains("extra"));
    }
}
