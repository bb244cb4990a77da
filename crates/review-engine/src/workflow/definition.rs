//! Workflow definitions and their structural validation

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use shared_types::{ComplianceStatus, ReviewResult, Severity};

use super::WorkflowError;
use crate::reporter::OutputFormat;

/// Condition a `check` step asserts on the review result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum Gate {
    /// Score must be at least `min`
    MinScore { min: f64 },
    /// Status must be no worse than `worst`
    StatusAtMost { worst: ComplianceStatus },
    /// No required requirement of this severity may be unmatched
    NoUnmatched { severity: Severity },
}

impl Gate {
    /// `Err` carries the reason the gate is closed
    pub fn evaluate(&self, result: &ReviewResult) -> Result<(), String> {
        match self {
            Self::MinScore { min } => {
                if result.compliance_score >= *min {
                    Ok(())
                } else {
                    Err(format!("score {:.1} is below {:.1}", result.compliance_score, min))
                }
            }
            Self::StatusAtMost { worst } => {
                if result.status <= *worst {
                    Ok(())
                } else {
                    Err(format!("status {} is worse than {}", result.status, worst))
                }
            }
            Self::NoUnmatched { severity } => {
                let missing: Vec<&str> = result
                    .findings
                    .iter()
                    .filter(|f| f.required && !f.matched && f.severity == *severity)
                    .map(|f| f.requirement_id.as_str())
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(format!("unmatched {} requirements: {}", severity, missing.join(", ")))
                }
            }
        }
    }
}

/// What a step does. Steps are a closed set; host code plugs in through
/// registered hooks referenced by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    Analyze,
    /// Uses the context's template when `template_id` is unset
    Validate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template_id: Option<String>,
    },
    Check(Gate),
    /// Render the review; also written to `path` when set
    Export {
        format: OutputFormat,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    Hook {
        name: String,
    },
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Validate { .. } => "validate",
            Self::Check(_) => "check",
            Self::Export { .. } => "export",
            Self::Hook { .. } => "hook",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub kind: StepKind,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// May run alongside other ready parallel steps
    #[serde(default)]
    pub parallel: bool,
    /// Keep going when this step fails
    #[serde(default)]
    pub continue_on_error: bool,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
            depends_on: Vec::new(),
            parallel: false,
            continue_on_error: false,
        }
    }

    pub fn after(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn hook_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|s| match &s.kind {
            StepKind::Hook { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Check ids and dependencies, returning step indices in execution order.
    ///
    /// The order is topological and otherwise follows declaration order.
    pub fn execution_order(&self) -> Result<Vec<usize>, WorkflowError> {
        let invalid = |reason: String| WorkflowError::InvalidDefinition {
            workflow: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("workflow name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("workflow has no steps".to_string()));
        }

        let mut index = HashMap::new();
        for (i, step) in self.steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                return Err(invalid(format!("step {} has an empty id", i + 1)));
            }
            if index.insert(step.id.as_str(), i).is_some() {
                return Err(invalid(format!("duplicate step id '{}'", step.id)));
            }
        }

        let mut indegree = vec![0usize; self.steps.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.steps.len()];
        for (i, step) in self.steps.iter().enumerate() {
            let mut seen = HashSet::new();
            for dep in &step.depends_on {
                let Some(&d) = index.get(dep.as_str()) else {
                    return Err(invalid(format!(
                        "step '{}' depends on unknown step '{}'",
                        step.id, dep
                    )));
                };
                if d == i {
                    return Err(invalid(format!("step '{}' depends on itself", step.id)));
                }
                if seen.insert(d) {
                    indegree[i] += 1;
                    dependents[d].push(i);
                }
            }
        }

        // Kahn's algorithm, always taking the earliest-declared ready step
        let mut order = Vec::with_capacity(self.steps.len());
        let mut ready: Vec<usize> = (0..self.steps.len()).filter(|&i| indegree[i] == 0).collect();
        while !ready.is_empty() {
            let pos = (0..ready.len()).min_by_key(|&p| ready[p]).unwrap_or(0);
            let next = ready.swap_remove(pos);
            order.push(next);
            for &dependent in &dependents[next] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }

        if order.len() != self.steps.len() {
            let cycle = self
                .steps
                .iter()
                .enumerate()
                .filter(|(i, _)| indegree[*i] > 0)
                .map(|(_, s)| s.id.clone())
                .collect();
            return Err(WorkflowError::CyclicDependency {
                workflow: self.name.clone(),
                steps: cycle,
            });
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(def: &WorkflowDefinition, order: Vec<usize>) -> Vec<&str> {
        order.into_iter().map(|i| def.steps[i].id.as_str()).collect()
    }

    #[test]
    fn test_declaration_order_when_independent() {
        let def = WorkflowDefinition::new("w", "")
            .with_step(WorkflowStep::new("a", StepKind::Analyze))
            .with_step(WorkflowStep::new("b", StepKind::Analyze))
            .with_step(WorkflowStep::new("c", StepKind::Analyze));
        let order = def.execution_order().unwrap();
        assert_eq!(ids(&def, order), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dependencies_reorder_steps() {
        let def = WorkflowDefinition::new("w", "")
            .with_step(
                WorkflowStep::new("validate", StepKind::Validate { template_id: None })
                    .after("analyze"),
            )
            .with_step(WorkflowStep::new("analyze", StepKind::Analyze));
        let order = def.execution_order().unwrap();
        assert_eq!(ids(&def, order), vec!["analyze", "validate"]);
    }

    #[test]
    fn test_cycle_detected() {
        let def = WorkflowDefinition::new("w", "")
            .with_step(WorkflowStep::new("a", StepKind::Analyze).after("c"))
            .with_step(WorkflowStep::new("b", StepKind::Analyze).after("a"))
            .with_step(WorkflowStep::new("c", StepKind::Analyze).after("b"))
            .with_step(WorkflowStep::new("d", StepKind::Analyze));
        match def.execution_order().unwrap_err() {
            WorkflowError::CyclicDependency { steps, .. } => assert_eq!(steps, vec!["a", "b", "c"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_structural_errors() {
        let unknown = WorkflowDefinition::new("w", "")
            .with_step(WorkflowStep::new("a", StepKind::Analyze).after("ghost"));
        assert!(matches!(
            unknown.execution_order(),
            Err(WorkflowError::InvalidDefinition { .. })
        ));

        let duplicate = WorkflowDefinition::new("w", "")
            .with_step(WorkflowStep::new("a", StepKind::Analyze))
            .with_step(WorkflowStep::new("a", StepKind::Analyze));
        assert!(duplicate.execution_order().is_err());

        let self_dep = WorkflowDefinition::new("w", "")
            .with_step(WorkflowStep::new("a", StepKind::Analyze).after("a"));
        assert!(self_dep.execution_order().is_err());

        assert!(WorkflowDefinition::new("w", "").execution_order().is_err());
    }

    #[test]
    fn test_step_kind_serialization() {
        let step = WorkflowStep::new("gate", StepKind::Check(Gate::MinScore { min: 80.0 }));
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["kind"]["kind"], "check");
        assert_eq!(json["kind"]["gate"], "min_score");
        let back: WorkflowStep = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        const STEPS: usize = 8;

        proptest! {
            #[test]
            fn order_places_dependencies_first(
                edges in prop::collection::vec(prop::collection::vec(any::<bool>(), STEPS), STEPS)
            ) {
                // s{i} may only depend on s{j} with j < i; declared last-to-first
                let mut def = WorkflowDefinition::new("w", "");
                for i in (0..STEPS).rev() {
                    let mut step = WorkflowStep::new(format!("s{i}"), StepKind::Analyze);
                    for j in (0..i).filter(|&j| edges[i][j]) {
                        step = step.after(format!("s{j}"));
                    }
                    def = def.with_step(step);
                }

                let order = def.execution_order().unwrap();
                prop_assert_eq!(order.len(), STEPS);
                let mut position = vec![usize::MAX; STEPS];
                for (pos, &index) in order.iter().enumerate() {
                    position[index] = pos;
                }
                for (index, step) in def.steps.iter().enumerate() {
                    for dep in &step.depends_on {
                        let d = def.steps.iter().position(|s| &s.id == dep).unwrap();
                        prop_assert!(position[d] < position[index]);
                    }
                }
            }
        }
    }
}
