//! Multi-step review workflows
//!
//! A workflow is a named list of steps drawn from a fixed set of kinds
//! (analyze, validate, check, export, hook). Steps declare dependencies;
//! definitions are checked for unknown references and cycles when they are
//! registered. Execution is sequential except that consecutive ready steps
//! marked `parallel` run together.

pub mod builtin;
pub mod definition;
pub mod manager;

use thiserror::Error;

pub use definition::{Gate, StepKind, WorkflowDefinition, WorkflowStep};
pub use manager::{
    ExecutionRecord, ExecutionState, StepHook, StepRecord, StepStatus, WorkflowContext,
    WorkflowManager, WorkflowStats, WorkflowSummary,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Unknown workflow: {name}")]
    UnknownWorkflow { name: String },

    #[error("Workflow already registered: {name}")]
    DuplicateWorkflow { name: String },

    #[error("Invalid workflow '{workflow}': {reason}")]
    InvalidDefinition { workflow: String, reason: String },

    #[error("Workflow '{workflow}' has a dependency cycle through: {}", steps.join(", "))]
    CyclicDependency { workflow: String, steps: Vec<String> },

    #[error("Workflow '{workflow}' uses unregistered hook '{hook}'")]
    UnknownHook { workflow: String, hook: String },

    #[error("Execution not found: {execution_id}")]
    ExecutionNotFound { execution_id: String },
}

impl WorkflowError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownWorkflow { .. } => "unknown_workflow",
            Self::DuplicateWorkflow { .. } => "duplicate_workflow",
            Self::InvalidDefinition { .. } => "invalid_definition",
            Self::CyclicDependency { .. } => "cyclic_dependency",
            Self::UnknownHook { .. } => "unknown_hook",
            Self::ExecutionNotFound { .. } => "execution_not_found",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::UnknownWorkflow { .. } => "List the registered workflows and pick one of them",
            Self::DuplicateWorkflow { .. } => "Register the workflow under a different name",
            Self::InvalidDefinition { .. } | Self::CyclicDependency { .. } => {
                "Fix the step ids and dependencies in the workflow definition"
            }
            Self::UnknownHook { .. } => "Register the hook before executing the workflow",
            Self::ExecutionNotFound { .. } => "Check the execution id",
        }
    }
}
