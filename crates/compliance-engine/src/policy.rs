//! Severity to status mapping

use serde::{Deserialize, Serialize};
use shared_types::{ComplianceStatus, Finding, Severity};

fn warning() -> ComplianceStatus {
    ComplianceStatus::Warning
}

fn passed() -> ComplianceStatus {
    ComplianceStatus::Passed
}

/// Status an unmatched *required* requirement of each severity forces on the
/// review. The overall status is the worst one forced by any finding.
///
/// Critical requirements always fail the review and are not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusPolicy {
    #[serde(default = "warning")]
    pub high: ComplianceStatus,
    #[serde(default = "passed")]
    pub medium: ComplianceStatus,
    #[serde(default = "passed")]
    pub low: ComplianceStatus,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            high: warning(),
            medium: passed(),
            low: passed(),
        }
    }
}

impl StatusPolicy {
    /// Override the status for one severity; `Critical` stays `Failed`
    pub fn with(mut self, severity: Severity, status: ComplianceStatus) -> Self {
        match severity {
            Severity::Critical => {}
            Severity::High => self.high = status,
            Severity::Medium => self.medium = status,
            Severity::Low => self.low = status,
        }
        self
    }

    pub fn status_for(&self, severity: Severity) -> ComplianceStatus {
        match severity {
            Severity::Critical => ComplianceStatus::Failed,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// Optional and matched findings never move the status
    pub fn overall(&self, findings: &[Finding]) -> ComplianceStatus {
        findings
            .iter()
            .filter(|f| f.required && !f.matched)
            .map(|f| self.status_for(f.severity))
            .max()
            .unwrap_or(ComplianceStatus::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn finding(severity: Severity, required: bool, matched: bool) -> Finding {
        Finding {
            requirement_id: format!("{}-{}", severity, matched),
            title: "t".into(),
            category: "general".into(),
            severity,
            required,
            matched,
            confidence: if matched { 1.0 } else { 0.0 },
            match_count: matched as usize,
            location: None,
            recommendation: None,
            notes: vec![],
        }
    }

    #[test]
    fn test_default_mapping() {
        let policy = StatusPolicy::default();
        assert_eq!(policy.status_for(Severity::Critical), ComplianceStatus::Failed);
        assert_eq!(policy.status_for(Severity::High), ComplianceStatus::Warning);
        assert_eq!(policy.status_for(Severity::Medium), ComplianceStatus::Passed);
        assert_eq!(policy.status_for(Severity::Low), ComplianceStatus::Passed);
    }

    #[test]
    fn test_worst_status_wins() {
        let policy = StatusPolicy::default();
        let findings = vec![
            finding(Severity::High, true, false),
            finding(Severity::Critical, true, false),
            finding(Severity::Low, true, true),
        ];
        assert_eq!(policy.overall(&findings), ComplianceStatus::Failed);
    }

    #[test]
    fn test_optional_findings_do_not_escalate() {
        let policy = StatusPolicy::default();
        let findings = vec![finding(Severity::Critical, false, false)];
        assert_eq!(policy.overall(&findings), ComplianceStatus::Passed);
    }

    #[test]
    fn test_custom_mapping() {
        let policy = StatusPolicy::default().with(Severity::Medium, ComplianceStatus::Warning);
        let findings = vec![finding(Severity::Medium, true, false)];
        assert_eq!(policy.overall(&findings), ComplianceStatus::Warning);
    }

    #[test]
    fn test_policy_from_toml_fills_defaults() {
        let policy: StatusPolicy = toml::from_str(r#"high = "failed""#).unwrap();
        assert_eq!(policy.high, ComplianceStatus::Failed);
        assert_eq!(policy.status_for(Severity::Critical), ComplianceStatus::Failed);
        assert_eq!(policy.medium, ComplianceStatus::Passed);
    }

    #[test]
    fn test_critical_cannot_be_relaxed() {
        let policy = StatusPolicy::default()
            .with(Severity::Critical, ComplianceStatus::Passed)
            .with(Severity::High, ComplianceStatus::Passed);
        let findings = vec![finding(Severity::Critical, true, false)];
        assert_eq!(policy.overall(&findings), ComplianceStatus::Failed);

        assert!(toml::from_str::<StatusPolicy>(r#"critical = "passed""#).is_err());
    }
}
