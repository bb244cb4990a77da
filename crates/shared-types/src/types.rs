use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::template::Severity;

/// Overall outcome of a review, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Passed,
    Warning,
    Failed,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Warning => "warning",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a requirement matched, for highlighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationHint {
    pub start_offset: usize, // Byte offset into the normalized document text
    pub end_offset: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page: Option<u32>,
    pub snippet: String,
}

/// Outcome of evaluating one requirement against one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub requirement_id: String,
    pub title: String,
    pub category: String,
    pub severity: Severity,
    pub required: bool,
    pub matched: bool,
    /// Heuristic strength of the match in [0, 1]; not a probability
    pub confidence: f64,
    pub match_count: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub location: Option<LocationHint>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub total_requirements: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub unmatched_critical: usize,
    pub unmatched_high: usize,
    pub unmatched_medium: usize,
    pub unmatched_low: usize,
}

impl ReviewSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self {
            total_requirements: findings.len(),
            ..Default::default()
        };
        for finding in findings {
            if finding.matched {
                summary.matched += 1;
                continue;
            }
            summary.unmatched += 1;
            match finding.severity {
                Severity::Critical => summary.unmatched_critical += 1,
                Severity::High => summary.unmatched_high += 1,
                Severity::Medium => summary.unmatched_medium += 1,
                Severity::Low => summary.unmatched_low += 1,
            }
        }
        summary
    }
}

/// Packaged result of a completed review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub request_id: String,
    pub document_id: String,
    pub filename: String,
    pub template_id: String,
    pub template_name: String,
    pub template_version: String,
    pub status: ComplianceStatus,
    /// Weighted share of matched requirements, 0-100 with one decimal
    pub compliance_score: f64,
    pub findings: Vec<Finding>,
    pub summary: ReviewSummary,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ReviewResult {
    pub fn finding(&self, requirement_id: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.requirement_id == requirement_id)
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.matched)
    }
}
