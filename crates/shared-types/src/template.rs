//! Template and requirement definitions
//!
//! Templates are plain data. Pattern compilation and validation happen when a
//! template is registered with the compliance engine's template store.

use serde::{Deserialize, Serialize};

/// Severity of an unmet requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    /// Higher is more severe
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 3,
            Self::High => 2,
            Self::Medium => 1,
            Self::Low => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detection pattern.
///
/// Serialized externally tagged, e.g. `{ literal = "CE" }` or
/// `{ regex = "notified\\s+body" }` in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Matched case-insensitively as a whole word or phrase
    Literal(String),
    /// Regular expression, compiled case-insensitively
    Regex(String),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn regex(expr: impl Into<String>) -> Self {
        Self::Regex(expr.into())
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Regex(s) => s,
        }
    }
}

/// Extra plausibility check run on a matched requirement.
///
/// A failing check adds a note to the finding; it never changes the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentCheck {
    /// Text around the first match must mention one of `terms`
    MentionsAny { terms: Vec<String>, message: String },
    /// No date in the document may lie after today
    NoFutureDates { message: String },
}

fn default_weight() -> f64 {
    1.0
}

fn default_required() -> bool {
    true
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub title: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub severity: Severity,
    pub patterns: Vec<Pattern>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Guidance shown when the requirement is not met
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recommendation: Option<String>,
    /// Optional requirements are scored but never escalate the status
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub regulation_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<ContentCheck>,
}

impl Requirement {
    pub fn new(id: impl Into<String>, title: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: default_category(),
            severity,
            patterns: Vec::new(),
            weight: default_weight(),
            recommendation: None,
            required: true,
            regulation_reference: None,
            checks: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_check(mut self, check: ContentCheck) -> Self {
        self.checks.push(check);
        self
    }
}

/// A named, ordered checklist of requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Regulations the template covers, e.g. "MDR 2017/745"
    #[serde(default)]
    pub regulations: Vec<String>,
    pub requirements: Vec<Requirement>,
}

impl Template {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            regulations: Vec::new(),
            requirements: Vec::new(),
        }
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn requirement(&self, id: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == id)
    }

    pub fn total_weight(&self) -> f64 {
        self.requirements.iter().map(|r| r.weight).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_severity_rank_order() {
        assert!(Severity::Critical.rank() > Severity::High.rank());
        assert!(Severity::High.rank() > Severity::Medium.rank());
        assert!(Severity::Medium.rank() > Severity::Low.rank());
    }

    #[test]
    fn test_pattern_json_shape() {
        let json = serde_json::to_string(&Pattern::literal("CE")).unwrap();
        assert_eq!(json, r#"{"literal":"CE"}"#);
        let parsed: Pattern = serde_json::from_str(r#"{"regex":"notified\\s+body"}"#).unwrap();
        assert_eq!(parsed, Pattern::regex(r"notified\s+body"));
    }

    #[test]
    fn test_requirement_defaults() {
        let json = r#"{
            "id": "ce_marking",
            "title": "CE marking",
            "severity": "high",
            "patterns": [{"literal": "CE"}]
        }"#;
        let req: Requirement = serde_json::from_str(json).unwrap();
        assert_eq!(req.weight, 1.0);
        assert!(req.required);
        assert_eq!(req.category, "general");
        assert!(req.checks.is_empty());
    }

    #[test]
    fn test_content_check_tagging() {
        let check = ContentCheck::NoFutureDates {
            message: "date in future".into(),
        };
        let json = serde_json::to_string(&check).unwrap();
        assert_eq!(json, r#"{"kind":"no_future_dates","message":"date in future"}"#);
    }

    #[test]
    fn test_template_builder() {
        let template = Template::new("t", "Test", "1.0")
            .with_requirement(Requirement::new("a", "A", Severity::High).with_weight(5.0))
            .with_requirement(Requirement::new("b", "B", Severity::Medium).with_weight(3.0));
        assert_eq!(template.total_weight(), 8.0);
        assert!(template.requirement("b").is_some());
        assert!(template.requirement("c").is_none());
    }
}
