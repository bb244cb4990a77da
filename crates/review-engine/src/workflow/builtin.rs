//! Workflows available without registration

use shared_types::Severity;

use super::definition::{Gate, StepKind, WorkflowDefinition, WorkflowStep};
use crate::reporter::OutputFormat;

pub const STANDARD_REVIEW: &str = "standard_review";
pub const ANALYSIS_ONLY: &str = "analysis_only";

/// Analyze, validate against the context's template, export JSON and text
/// side by side, then require that no critical requirement is missing
pub fn standard_review() -> WorkflowDefinition {
    WorkflowDefinition::new(STANDARD_REVIEW, "Full review with exports and a critical-gap gate")
        .with_step(WorkflowStep::new("analyze", StepKind::Analyze))
        .with_step(
            WorkflowStep::new("validate", StepKind::Validate { template_id: None })
                .after("analyze"),
        )
        .with_step(
            WorkflowStep::new(
                "export_json",
                StepKind::Export {
                    format: OutputFormat::JsonPretty,
                    path: None,
                },
            )
            .after("validate")
            .parallel(),
        )
        .with_step(
            WorkflowStep::new(
                "export_text",
                StepKind::Export {
                    format: OutputFormat::Text,
                    path: None,
                },
            )
            .after("validate")
            .parallel(),
        )
        .with_step(
            WorkflowStep::new(
                "critical_gate",
                StepKind::Check(Gate::NoUnmatched {
                    severity: Severity::Critical,
                }),
            )
            .after("validate"),
        )
}

pub fn analysis_only() -> WorkflowDefinition {
    WorkflowDefinition::new(ANALYSIS_ONLY, "Extract text and structure without validation")
        .with_step(WorkflowStep::new("analyze", StepKind::Analyze))
}

pub fn builtin_workflows() -> Vec<WorkflowDefinition> {
    vec![standard_review(), analysis_only()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_valid() {
        for workflow in builtin_workflows() {
            assert!(workflow.execution_order().is_ok(), "{} is invalid", workflow.name);
        }
    }

    #[test]
    fn test_standard_review_order() {
        let workflow = standard_review();
        let order: Vec<&str> = workflow
            .execution_order()
            .unwrap()
            .into_iter()
            .map(|i| workflow.steps[i].id.as_str())
            .collect();
        assert_eq!(
            order,
            vec!["analyze", "validate", "export_json", "export_text", "critical_gate"]
        );
    }
}
