//! Template and validation errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComplianceError {
    #[error("Template not found: {template_id}")]
    TemplateNotFound { template_id: String },

    #[error("Invalid template '{template_id}': {reason}")]
    InvalidTemplate { template_id: String, reason: String },

    #[error("Invalid pattern '{pattern}' in {template_id}/{requirement_id}: {reason}")]
    InvalidPattern {
        template_id: String,
        requirement_id: String,
        pattern: String,
        reason: String,
    },
}

impl ComplianceError {
    pub(crate) fn invalid(template_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template_id: template_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TemplateNotFound { .. } => "template_not_found",
            Self::InvalidTemplate { .. } => "invalid_template",
            Self::InvalidPattern { .. } => "invalid_pattern",
        }
    }

    pub fn template_id(&self) -> &str {
        match self {
            Self::TemplateNotFound { template_id }
            | Self::InvalidTemplate { template_id, .. }
            | Self::InvalidPattern { template_id, .. } => template_id,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::TemplateNotFound { template_id } => {
                format!("No review template named '{}' exists", template_id)
            }
            Self::InvalidTemplate { template_id, .. }
            | Self::InvalidPattern { template_id, .. } => {
                format!("Review template '{}' is misconfigured", template_id)
            }
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::TemplateNotFound { .. } => "Pick one of the registered templates",
            Self::InvalidTemplate { .. } => "Fix the template definition and register it again",
            Self::InvalidPattern { .. } => "Correct the regular expression in the template",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_not_found_message() {
        let err = ComplianceError::TemplateNotFound {
            template_id: "fda_510k".into(),
        };
        assert_eq!(err.to_string(), "Template not found: fda_510k");
        assert_eq!(err.kind(), "template_not_found");
        assert_eq!(err.template_id(), "fda_510k");
    }
}
