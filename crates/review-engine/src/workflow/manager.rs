//! Workflow registration and execution

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use compliance_engine::{TemplateProcessor, ValidationOptions};
use document_analyzer::{AnalysisResult, UploadedFile};
use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{Document, ReviewResult, StructureSummary};
use tokio::sync::{Notify, RwLock};
use tracing::{debug, error, info, instrument, warn};

use super::builtin::builtin_workflows;
use super::definition::{StepKind, WorkflowDefinition, WorkflowStep};
use super::WorkflowError;
use crate::analysis::DocumentAnalysis;
use crate::engine::package;
use crate::reporter::{OutputFormat, Reporter};

/// Data flowing between steps
#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    pub file: Option<Arc<UploadedFile>>,
    /// Template used by `validate` steps that don't name one
    pub template_id: Option<String>,
    pub options: ValidationOptions,
    pub document: Option<Document>,
    pub structure: Option<StructureSummary>,
    pub review: Option<ReviewResult>,
    /// Rendered exports keyed by step id
    pub exports: BTreeMap<String, String>,
    /// Hook outputs keyed by step id
    pub values: BTreeMap<String, Value>,
}

impl WorkflowContext {
    pub fn for_file(file: UploadedFile) -> Self {
        Self {
            file: Some(Arc::new(file)),
            ..Default::default()
        }
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    fn apply(&mut self, step_id: &str, effect: StepEffect) {
        match effect {
            StepEffect::Analyzed(analysis) => {
                let analysis = *analysis;
                self.document = Some(analysis.document);
                self.structure = Some(analysis.structure);
            }
            StepEffect::Validated(review) => self.review = Some(*review),
            StepEffect::Checked => {}
            StepEffect::Exported { content, .. } => {
                self.exports.insert(step_id.to_string(), content);
            }
            StepEffect::Hook(value) => {
                self.values.insert(step_id.to_string(), value);
            }
        }
    }
}

/// Host-provided step logic, referenced from workflows by name.
///
/// Plain closures `Fn(&WorkflowContext) -> anyhow::Result<Value>` implement
/// this directly.
pub trait StepHook: Send + Sync {
    fn run<'a>(&'a self, ctx: &'a WorkflowContext) -> BoxFuture<'a, anyhow::Result<Value>>;
}

impl<F> StepHook for F
where
    F: Fn(&WorkflowContext) -> anyhow::Result<Value> + Send + Sync,
{
    fn run<'a>(&'a self, ctx: &'a WorkflowContext) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(future::ready(self(ctx)))
    }
}

enum StepEffect {
    Analyzed(Box<AnalysisResult>),
    Validated(Box<ReviewResult>),
    Checked,
    Exported { format: OutputFormat, content: String },
    Hook(Value),
}

impl StepEffect {
    /// Compact summary kept on the step record
    fn summary(&self) -> Value {
        match self {
            Self::Analyzed(analysis) => json!({
                "document_id": analysis.document.id,
                "pages": analysis.document.pages.len(),
                "words": analysis.document.metadata.word_count,
                "method": analysis.extraction.method,
            }),
            Self::Validated(review) => json!({
                "template_id": review.template_id,
                "status": review.status,
                "compliance_score": review.compliance_score,
                "matched": review.summary.matched,
                "unmatched": review.summary.unmatched,
            }),
            Self::Checked => json!({ "passed": true }),
            Self::Exported { format, content } => json!({
                "format": format,
                "bytes": content.len(),
            }),
            Self::Hook(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub kind: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Everything known about one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub workflow: String,
    pub state: ExecutionState,
    /// In declaration order
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub review: Option<ReviewResult>,
    #[serde(default)]
    pub exports: BTreeMap<String, String>,
}

impl ExecutionRecord {
    pub fn step(&self, step_id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub description: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub registered_workflows: usize,
    pub executions: u64,
    pub completed: u64,
    pub failed: u64,
    pub running: usize,
    pub average_duration_ms: f64,
}

#[derive(Default)]
struct Counters {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    duration_ms: AtomicU64,
}

/// Registers workflows and hooks and runs executions
pub struct WorkflowManager {
    analyzer: Arc<dyn DocumentAnalysis>,
    processor: Arc<TemplateProcessor>,
    workflows: RwLock<BTreeMap<String, Arc<WorkflowDefinition>>>,
    hooks: RwLock<HashMap<String, Arc<dyn StepHook>>>,
    executions: RwLock<HashMap<String, ExecutionRecord>>,
    finished: Notify,
    counters: Counters,
}

impl WorkflowManager {
    /// Manager with the built-in workflows registered
    pub fn new(analyzer: Arc<dyn DocumentAnalysis>, processor: Arc<TemplateProcessor>) -> Self {
        let workflows = builtin_workflows()
            .into_iter()
            .map(|w| (w.name.clone(), Arc::new(w)))
            .collect();
        Self {
            analyzer,
            processor,
            workflows: RwLock::new(workflows),
            hooks: RwLock::new(HashMap::new()),
            executions: RwLock::new(HashMap::new()),
            finished: Notify::new(),
            counters: Counters::default(),
        }
    }

    pub async fn register_workflow(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<(), WorkflowError> {
        definition.execution_order()?;
        let mut workflows = self.workflows.write().await;
        if workflows.contains_key(&definition.name) {
            return Err(WorkflowError::DuplicateWorkflow {
                name: definition.name.clone(),
            });
        }
        info!(workflow = %definition.name, steps = definition.steps.len(), "Workflow registered");
        workflows.insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    /// Register or replace a hook
    pub async fn register_hook(&self, name: impl Into<String>, hook: impl StepHook + 'static) {
        let name = name.into();
        debug!(hook = %name, "Hook registered");
        self.hooks.write().await.insert(name, Arc::new(hook));
    }

    pub async fn list_workflows(&self) -> Vec<WorkflowSummary> {
        self.workflows
            .read()
            .await
            .values()
            .map(|w| WorkflowSummary {
                name: w.name.clone(),
                description: w.description.clone(),
                steps: w.steps.iter().map(|s| s.id.clone()).collect(),
            })
            .collect()
    }

    /// Start an execution in the background and return its id
    pub async fn execute(
        self: &Arc<Self>,
        workflow: &str,
        ctx: WorkflowContext,
    ) -> Result<String, WorkflowError> {
        let (definition, order, execution_id) = self.prepare(workflow).await?;
        let manager = Arc::clone(self);
        let id = execution_id.clone();
        tokio::spawn(async move {
            manager.drive(&id, &definition, order, ctx).await;
        });
        Ok(execution_id)
    }

    /// Run an execution to completion on the current task
    pub async fn run(
        &self,
        workflow: &str,
        ctx: WorkflowContext,
    ) -> Result<ExecutionRecord, WorkflowError> {
        let (definition, order, execution_id) = self.prepare(workflow).await?;
        self.drive(&execution_id, &definition, order, ctx).await;
        self.execution(&execution_id).await
    }

    pub async fn execution(&self, execution_id: &str) -> Result<ExecutionRecord, WorkflowError> {
        self.executions
            .read()
            .await
            .get(execution_id)
            .cloned()
            .ok_or_else(|| WorkflowError::ExecutionNotFound {
                execution_id: execution_id.to_string(),
            })
    }

    /// Wait for a background execution to finish
    pub async fn wait(&self, execution_id: &str) -> Result<ExecutionRecord, WorkflowError> {
        loop {
            let notified = self.finished.notified();
            let record = self.execution(execution_id).await?;
            if record.state != ExecutionState::Running {
                return Ok(record);
            }
            notified.await;
        }
    }

    pub async fn stats(&self) -> WorkflowStats {
        let running = self
            .executions
            .read()
            .await
            .values()
            .filter(|e| e.state == ExecutionState::Running)
            .count();
        let completed = self.counters.completed.load(Ordering::Relaxed);
        let failed = self.counters.failed.load(Ordering::Relaxed);
        let finished = completed + failed;
        WorkflowStats {
            registered_workflows: self.workflows.read().await.len(),
            executions: self.counters.started.load(Ordering::Relaxed),
            completed,
            failed,
            running,
            average_duration_ms: if finished == 0 {
                0.0
            } else {
                self.counters.duration_ms.load(Ordering::Relaxed) as f64 / finished as f64
            },
        }
    }

    async fn prepare(
        &self,
        workflow: &str,
    ) -> Result<(Arc<WorkflowDefinition>, Vec<usize>, String), WorkflowError> {
        let definition = self
            .workflows
            .read()
            .await
            .get(workflow)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownWorkflow {
                name: workflow.to_string(),
            })?;
        let order = definition.execution_order()?;

        {
            let hooks = self.hooks.read().await;
            if let Some(missing) = definition.hook_names().find(|h| !hooks.contains_key(*h)) {
                return Err(WorkflowError::UnknownHook {
                    workflow: definition.name.clone(),
                    hook: missing.to_string(),
                });
            }
        }

        let execution_id = uuid::Uuid::new_v4().to_string();
        let record = ExecutionRecord {
            id: execution_id.clone(),
            workflow: definition.name.clone(),
            state: ExecutionState::Running,
            steps: definition
                .steps
                .iter()
                .map(|s| StepRecord {
                    step_id: s.id.clone(),
                    kind: s.kind.label().to_string(),
                    status: StepStatus::Pending,
                    started_at: None,
                    duration_ms: None,
                    output: None,
                    error: None,
                })
                .collect(),
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            error: None,
            review: None,
            exports: BTreeMap::new(),
        };
        self.executions.write().await.insert(execution_id.clone(), record);
        self.counters.started.fetch_add(1, Ordering::Relaxed);
        Ok((definition, order, execution_id))
    }

    async fn update_step(
        &self,
        execution_id: &str,
        index: usize,
        apply: impl FnOnce(&mut StepRecord),
    ) {
        if let Some(record) = self.executions.write().await.get_mut(execution_id) {
            if let Some(step) = record.steps.get_mut(index) {
                apply(step);
            }
        }
    }

    #[instrument(skip(self, definition, order, ctx), fields(workflow = %definition.name))]
    async fn drive(
        &self,
        execution_id: &str,
        definition: &WorkflowDefinition,
        order: Vec<usize>,
        mut ctx: WorkflowContext,
    ) {
        let started = Instant::now();
        let steps = &definition.steps;
        let mut status = vec![StepStatus::Pending; steps.len()];
        let mut halted: Option<String> = None;
        info!(execution_id, "Workflow started");

        let mut cursor = 0;
        while cursor < order.len() {
            let index = order[cursor];

            if let Some(reason) = &halted {
                let reason = format!("skipped: {}", reason);
                status[index] = StepStatus::Skipped;
                self.update_step(execution_id, index, |s| {
                    s.status = StepStatus::Skipped;
                    s.error = Some(reason);
                })
                .await;
                cursor += 1;
                continue;
            }

            if let Some(dep) = unmet_dependency(definition, &steps[index], &status) {
                let reason = format!("skipped: dependency '{}' did not complete", dep);
                debug!(step = %steps[index].id, dependency = %dep, "Step skipped");
                status[index] = StepStatus::Skipped;
                self.update_step(execution_id, index, |s| {
                    s.status = StepStatus::Skipped;
                    s.error = Some(reason);
                })
                .await;
                cursor += 1;
                continue;
            }

            let mut batch = vec![index];
            if steps[index].parallel {
                while let Some(&next) = order.get(cursor + batch.len()) {
                    let candidate = &steps[next];
                    if !candidate.parallel
                        || unmet_dependency(definition, candidate, &status).is_some()
                    {
                        break;
                    }
                    batch.push(next);
                }
            }
            cursor += batch.len();

            let batch_started = Utc::now();
            for &i in &batch {
                status[i] = StepStatus::Running;
                self.update_step(execution_id, i, |s| {
                    s.status = StepStatus::Running;
                    s.started_at = Some(batch_started);
                })
                .await;
            }

            let ctx_ref = &ctx;
            let outcomes = future::join_all(batch.iter().map(|&i| async move {
                let step_started = Instant::now();
                let outcome = self.run_step(execution_id, &steps[i], ctx_ref).await;
                (i, outcome, step_started.elapsed().as_millis() as u64)
            }))
            .await;

            for (i, outcome, duration_ms) in outcomes {
                let step = &steps[i];
                match outcome {
                    Ok(effect) => {
                        let output = effect.summary();
                        ctx.apply(&step.id, effect);
                        status[i] = StepStatus::Completed;
                        debug!(step = %step.id, duration_ms, "Step completed");
                        self.update_step(execution_id, i, |s| {
                            s.status = StepStatus::Completed;
                            s.duration_ms = Some(duration_ms);
                            s.output = Some(output);
                        })
                        .await;
                    }
                    Err(e) => {
                        let message = format!("{:#}", e);
                        status[i] = StepStatus::Failed;
                        if step.continue_on_error {
                            warn!(step = %step.id, error = %message, "Step failed, continuing");
                        } else {
                            error!(
                                step = %step.id,
                                error = %message,
                                "Step failed, halting workflow"
                            );
                            halted.get_or_insert_with(|| format!("step '{}' failed", step.id));
                        }
                        self.update_step(execution_id, i, |s| {
                            s.status = StepStatus::Failed;
                            s.duration_ms = Some(duration_ms);
                            s.error = Some(message);
                        })
                        .await;
                    }
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let state = if halted.is_some() {
            ExecutionState::Failed
        } else {
            ExecutionState::Completed
        };
        if let Some(record) = self.executions.write().await.get_mut(execution_id) {
            record.state = state;
            record.completed_at = Some(Utc::now());
            record.duration_ms = Some(duration_ms);
            record.error = halted;
            record.review = ctx.review;
            record.exports = ctx.exports;
        }

        self.counters.duration_ms.fetch_add(duration_ms, Ordering::Relaxed);
        match state {
            ExecutionState::Failed => self.counters.failed.fetch_add(1, Ordering::Relaxed),
            _ => self.counters.completed.fetch_add(1, Ordering::Relaxed),
        };
        info!(execution_id, ?state, duration_ms, "Workflow finished");
        self.finished.notify_waiters();
    }

    async fn run_step(
        &self,
        execution_id: &str,
        step: &WorkflowStep,
        ctx: &WorkflowContext,
    ) -> anyhow::Result<StepEffect> {
        match &step.kind {
            StepKind::Analyze => {
                let file = ctx.file.clone().context("no input file in the workflow context")?;
                let analyzer = Arc::clone(&self.analyzer);
                let analysis = tokio::task::spawn_blocking(move || analyzer.analyze(&file))
                    .await
                    .context("analysis task failed")??;
                Ok(StepEffect::Analyzed(Box::new(analysis)))
            }
            StepKind::Validate { template_id } => {
                let document = ctx
                    .document
                    .as_ref()
                    .context("validation needs an analyzed document")?;
                let template_id = template_id
                    .as_deref()
                    .or(ctx.template_id.as_deref())
                    .context("no template selected for validation")?;
                let validation = self.processor.validate(document, template_id, &ctx.options)?;
                Ok(StepEffect::Validated(Box::new(package(execution_id, document, validation))))
            }
            StepKind::Check(gate) => {
                let review = ctx.review.as_ref().context("check needs a validation result")?;
                gate.evaluate(review)
                    .map_err(|reason| anyhow!("gate closed: {}", reason))?;
                Ok(StepEffect::Checked)
            }
            StepKind::Export { format, path } => {
                let review = ctx.review.as_ref().context("export needs a validation result")?;
                let content = Reporter::new(*format).format_result(review)?;
                if let Some(path) = path {
                    write_export(path, &content)?;
                }
                Ok(StepEffect::Exported {
                    format: *format,
                    content,
                })
            }
            StepKind::Hook { name } => {
                let hook = self
                    .hooks
                    .read()
                    .await
                    .get(name)
                    .cloned()
                    .with_context(|| format!("hook '{}' is not registered", name))?;
                let value = hook
                    .run(ctx)
                    .await
                    .with_context(|| format!("hook '{}' failed", name))?;
                Ok(StepEffect::Hook(value))
            }
        }
    }
}

fn write_export(path: &Path, content: &str) -> anyhow::Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write export: {}", path.display()))
}

/// First dependency of `step` that has not completed
fn unmet_dependency<'a>(
    definition: &WorkflowDefinition,
    step: &'a WorkflowStep,
    status: &[StepStatus],
) -> Option<&'a str> {
    step.depends_on
        .iter()
        .find(|dep| {
            definition
                .steps
                .iter()
                .position(|s| &s.id == *dep)
                .map_or(true, |i| status[i] != StepStatus::Completed)
        })
        .map(String::as_str)
}
