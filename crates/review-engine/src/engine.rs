//! Asynchronous review queue
//!
//! Requests are accepted into a bounded FIFO queue and processed by a fixed
//! pool of worker tasks:
//!
//! ```text
//! submit ──► [ bounded mpsc queue ] ──► worker 1 ─┐
//!                                   ──► worker 2 ─┼─► analyze ─► validate ─► package
//!                                   ──► worker N ─┘   (blocking pool)
//! ```
//!
//! Every request is tracked in an in-memory record keyed by request id. The
//! record moves `queued -> running -> completed | failed` (or `abandoned`)
//! and is evicted by a background sweeper once the retention window passes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use compliance_engine::{ComplianceError, TemplateInfo, TemplateProcessor, ValidationResult};
use document_analyzer::DocumentAnalyzer;
use serde::{Deserialize, Serialize};
use shared_types::{Document, ReviewResult};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::analysis::DocumentAnalysis;
use crate::config::{EngineConfig, EngineSettings};
use crate::error::{EngineError, ReviewFailure};
use crate::request::{
    progress, ProgressEvent, QueuedRequest, RequestState, RequestStatus, ReviewOutcome,
    ReviewRequest,
};

const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Build the caller-facing result from an analyzed document and its validation
pub fn package(
    request_id: &str,
    document: &Document,
    validation: ValidationResult,
) -> ReviewResult {
    ReviewResult {
        request_id: request_id.to_string(),
        document_id: document.id.clone(),
        filename: document.filename.clone(),
        template_id: validation.template_id,
        template_name: validation.template_name,
        template_version: validation.template_version,
        status: validation.status,
        compliance_score: validation.compliance_score,
        findings: validation.findings,
        summary: validation.summary,
        recommendations: validation.recommendations,
        generated_at: Utc::now(),
    }
}

struct RequestRecord {
    sequence: u64,
    state: RequestState,
    progress: u8,
    filename: String,
    template_id: String,
    submitted_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    /// Monotonic completion time for retention
    finished: Option<Instant>,
    result: Option<ReviewResult>,
    failure: Option<ReviewFailure>,
}

impl RequestRecord {
    fn queued(sequence: u64, request: &ReviewRequest) -> Self {
        Self {
            sequence,
            state: RequestState::Queued,
            progress: progress::QUEUED,
            filename: request.file.filename.clone(),
            template_id: request.template_id.clone(),
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            finished: None,
            result: None,
            failure: None,
        }
    }

    fn mark_finished(&mut self, state: RequestState) {
        self.state = state;
        self.completed_at = Some(Utc::now());
        self.finished = Some(Instant::now());
    }

    fn event(&self, request_id: &str) -> ProgressEvent {
        ProgressEvent {
            request_id: request_id.to_string(),
            state: self.state,
            progress: self.progress,
        }
    }

    fn status(&self, request_id: &str) -> RequestStatus {
        RequestStatus {
            request_id: request_id.to_string(),
            state: self.state,
            progress: self.progress,
            filename: self.filename.clone(),
            template_id: self.template_id.clone(),
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.failure.clone(),
        }
    }
}

/// Counters and gauges for the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub workers: usize,
    pub queue_capacity: usize,
    pub submitted: u64,
    /// Submissions turned away (full queue, unknown template, duplicate id)
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub abandoned: u64,
    pub queued: usize,
    pub running: usize,
    pub retained: usize,
    pub average_processing_ms: f64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    abandoned: AtomicU64,
    processed: AtomicU64,
    processing_ms: AtomicU64,
}

struct Shared {
    settings: EngineSettings,
    analyzer: Arc<dyn DocumentAnalysis>,
    processor: Arc<TemplateProcessor>,
    records: RwLock<HashMap<String, RequestRecord>>,
    progress: broadcast::Sender<ProgressEvent>,
    sequence: AtomicU64,
    counters: Counters,
}

impl Shared {
    fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.progress.send(event);
    }

    /// Move a queued request to running; false if it was abandoned meanwhile
    async fn begin(&self, request_id: &str) -> bool {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(request_id) else {
            return false;
        };
        if record.state != RequestState::Queued {
            return false;
        }
        record.state = RequestState::Running;
        record.started_at = Some(Utc::now());
        let event = record.event(request_id);
        drop(records);
        self.publish(event);
        true
    }

    async fn set_progress(&self, request_id: &str, value: u8) {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(request_id) else {
            return;
        };
        if record.state != RequestState::Running {
            return;
        }
        record.progress = value;
        let event = record.event(request_id);
        drop(records);
        self.publish(event);
    }

    #[instrument(
        skip(self, request),
        fields(request_id = %request.id, template_id = %request.template_id)
    )]
    async fn process(&self, request: ReviewRequest) {
        if !self.begin(&request.id).await {
            debug!("Skipping request that is no longer queued");
            return;
        }

        let started = Instant::now();
        let timeout = request.timeout.unwrap_or_else(|| self.settings.request_timeout());
        let outcome = match tokio::time::timeout(timeout, self.run_pipeline(&request)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(EngineError::Timeout {
                request_id: request.id.clone(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };
        self.finish(&request.id, outcome, started.elapsed()).await;
    }

    async fn run_pipeline(&self, request: &ReviewRequest) -> Result<ReviewResult, EngineError> {
        let analyzer = Arc::clone(&self.analyzer);
        let file = Arc::clone(&request.file);
        // A timeout abandons this task but cannot stop the blocking analysis itself
        let analysis =
            run_blocking(&request.id, "analysis", move || analyzer.analyze(&file)).await??;
        self.set_progress(&request.id, progress::PARSED).await;

        let processor = Arc::clone(&self.processor);
        let template_id = request.template_id.clone();
        let options = request.options.clone();
        let (document, validation) = run_blocking(&request.id, "validation", move || {
            let validation = processor.validate(&analysis.document, &template_id, &options);
            (analysis.document, validation)
        })
        .await?;
        let validation = validation?;
        self.set_progress(&request.id, progress::VALIDATED).await;

        Ok(package(&request.id, &document, validation))
    }

    async fn finish(
        &self,
        request_id: &str,
        outcome: Result<ReviewResult, EngineError>,
        elapsed: Duration,
    ) {
        let elapsed_ms = elapsed.as_millis() as u64;
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        self.counters.processing_ms.fetch_add(elapsed_ms, Ordering::Relaxed);

        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(request_id) else {
            return;
        };
        if record.state == RequestState::Abandoned {
            info!(elapsed_ms, "Discarding result of abandoned request");
            return;
        }

        match outcome {
            Ok(result) => {
                info!(
                    score = result.compliance_score,
                    status = %result.status,
                    elapsed_ms,
                    "Review completed"
                );
                record.progress = progress::PACKAGED;
                record.result = Some(result);
                record.mark_finished(RequestState::Completed);
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(kind = e.kind(), error = %e, elapsed_ms, "Review failed");
                if matches!(e, EngineError::Timeout { .. }) {
                    self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                }
                record.failure = Some(e.to_failure());
                record.mark_finished(RequestState::Failed);
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        let event = record.event(request_id);
        drop(records);
        self.publish(event);
    }

    async fn sweep_expired(&self) -> usize {
        let retention = self.settings.retention();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| match record.finished {
            Some(finished) if record.state.is_terminal() => finished.elapsed() < retention,
            _ => true,
        });
        before - records.len()
    }
}

/// Run one pipeline stage on the blocking pool so a panic inside it fails
/// the request instead of the worker
async fn run_blocking<T, F>(request_id: &str, stage: &str, f: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::Internal {
            request_id: request_id.to_string(),
            detail: format!("{} task failed: {}", stage, e),
        })
}

async fn worker_loop(
    index: usize,
    shared: Arc<Shared>,
    queue: Arc<Mutex<mpsc::Receiver<ReviewRequest>>>,
) {
    debug!(worker = index, "Review worker started");
    loop {
        let next = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(request) = next else {
            break;
        };
        shared.process(request).await;
    }
    debug!(worker = index, "Review worker stopped");
}

fn spawn_sweeper(shared: Weak<Shared>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            let removed = shared.sweep_expired().await;
            if removed > 0 {
                debug!(removed, "Expired review records evicted");
            }
        }
    })
}

/// Bounded, asynchronous document review service.
///
/// Must be created inside a Tokio runtime; workers and the retention sweeper
/// are spawned immediately.
pub struct ReviewEngine {
    shared: Arc<Shared>,
    accepting: AtomicBool,
    sender: RwLock<Option<mpsc::Sender<ReviewRequest>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    sweeper: JoinHandle<()>,
}

impl ReviewEngine {
    pub fn new(
        settings: EngineSettings,
        analyzer: Arc<dyn DocumentAnalysis>,
        processor: Arc<TemplateProcessor>,
    ) -> Self {
        let worker_count = settings.worker_count.max(1);
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        let sweep_interval = settings.sweep_interval().max(Duration::from_millis(1));

        let shared = Arc::new(Shared {
            settings,
            analyzer,
            processor,
            records: RwLock::new(HashMap::new()),
            progress,
            sequence: AtomicU64::new(0),
            counters: Counters::default(),
        });

        let queue = Arc::new(Mutex::new(receiver));
        let workers = (0..worker_count)
            .map(|i| tokio::spawn(worker_loop(i, Arc::clone(&shared), Arc::clone(&queue))))
            .collect();
        let sweeper = spawn_sweeper(Arc::downgrade(&shared), sweep_interval);

        info!(
            workers = worker_count,
            queue_capacity = shared.settings.queue_capacity,
            timeout_ms = shared.settings.request_timeout_ms,
            "Review engine started"
        );

        Self {
            shared,
            accepting: AtomicBool::new(true),
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            sweeper,
        }
    }

    /// Engine with the real analyzer and the templates named in `config`
    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let store = Arc::new(config.build_store()?);
        let processor = Arc::new(TemplateProcessor::with_policy(store, config.policy));
        let analyzer: Arc<dyn DocumentAnalysis> =
            Arc::new(DocumentAnalyzer::new(config.analyzer.clone()));
        Ok(Self::new(config.engine.clone(), analyzer, processor))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.shared.settings
    }

    pub fn processor(&self) -> &Arc<TemplateProcessor> {
        &self.shared.processor
    }

    pub fn list_templates(&self) -> Vec<TemplateInfo> {
        self.shared.processor.store().list_templates()
    }

    /// Queue a request and return its id without waiting for processing
    #[instrument(
        skip(self, request),
        fields(request_id = %request.id, template_id = %request.template_id)
    )]
    pub async fn submit(&self, request: ReviewRequest) -> Result<String, EngineError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(EngineError::ShuttingDown);
        }
        if !self.shared.processor.store().contains(&request.template_id) {
            self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("Rejected request for unknown template");
            return Err(ComplianceError::TemplateNotFound {
                template_id: request.template_id.clone(),
            }
            .into());
        }

        let sender_guard = self.sender.read().await;
        let Some(sender) = sender_guard.as_ref() else {
            return Err(EngineError::ShuttingDown);
        };

        // Held across try_send so a worker never sees a job without its record
        let mut records = self.shared.records.write().await;
        if records.contains_key(&request.id) {
            self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(EngineError::DuplicateRequest {
                request_id: request.id.clone(),
            });
        }

        let request_id = request.id.clone();
        let filename = request.file.filename.clone();
        let sequence = self.shared.sequence.fetch_add(1, Ordering::Relaxed);
        let record = RequestRecord::queued(sequence, &request);
        match sender.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(capacity = self.shared.settings.queue_capacity, "Review queue full");
                return Err(EngineError::WorkerPoolExhausted {
                    capacity: self.shared.settings.queue_capacity,
                });
            }
            Err(TrySendError::Closed(_)) => return Err(EngineError::ShuttingDown),
        }
        let event = record.event(&request_id);
        records.insert(request_id.clone(), record);
        // Published under the lock so `queued` always precedes `running`
        self.shared.publish(event);
        drop(records);

        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        info!(%filename, "Review queued");
        Ok(request_id)
    }

    pub async fn status(&self, request_id: &str) -> Result<RequestStatus, EngineError> {
        let records = self.shared.records.read().await;
        records
            .get(request_id)
            .map(|record| record.status(request_id))
            .ok_or_else(|| EngineError::NotFound {
                request_id: request_id.to_string(),
            })
    }

    /// Terminal outcome, or `NotReady` while the request is queued or running
    pub async fn result(&self, request_id: &str) -> Result<ReviewOutcome, EngineError> {
        let records = self.shared.records.read().await;
        let record = records.get(request_id).ok_or_else(|| EngineError::NotFound {
            request_id: request_id.to_string(),
        })?;

        match (record.state, &record.result, &record.failure) {
            (RequestState::Completed, Some(result), _) => Ok(ReviewOutcome::Completed {
                result: result.clone(),
            }),
            (RequestState::Failed, _, Some(failure)) => Ok(ReviewOutcome::Failed {
                failure: failure.clone(),
            }),
            (RequestState::Abandoned, _, _) => Ok(ReviewOutcome::Abandoned),
            (RequestState::Queued | RequestState::Running, _, _) => Err(EngineError::NotReady {
                request_id: request_id.to_string(),
                state: record.state,
            }),
            (state, _, _) => Err(EngineError::Internal {
                request_id: request_id.to_string(),
                detail: format!("{} record has no outcome", state),
            }),
        }
    }

    /// Wait until the request reaches a terminal state
    pub async fn wait(&self, request_id: &str) -> Result<ReviewOutcome, EngineError> {
        let mut events = self.shared.progress.subscribe();
        loop {
            match self.result(request_id).await {
                Err(EngineError::NotReady { .. }) => {}
                other => return other,
            }
            loop {
                match events.recv().await {
                    Ok(event)
                        if event.request_id == request_id && event.state.is_terminal() =>
                    {
                        break
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => {
                        return self.result(request_id).await
                    }
                }
            }
        }
    }

    /// Give up on a request. A running review finishes in the background
    /// and its result is discarded. Returns false if it had already finished.
    pub async fn abandon(&self, request_id: &str) -> Result<bool, EngineError> {
        let mut records = self.shared.records.write().await;
        let record = records.get_mut(request_id).ok_or_else(|| EngineError::NotFound {
            request_id: request_id.to_string(),
        })?;
        if record.state.is_terminal() {
            return Ok(false);
        }
        record.mark_finished(RequestState::Abandoned);
        let event = record.event(request_id);
        drop(records);

        self.shared.counters.abandoned.fetch_add(1, Ordering::Relaxed);
        self.shared.publish(event);
        info!(request_id, "Review abandoned");
        Ok(true)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.shared.progress.subscribe()
    }

    /// Requests still waiting for a worker, oldest first
    pub async fn queue_snapshot(&self) -> Vec<QueuedRequest> {
        let records = self.shared.records.read().await;
        let mut queued: Vec<(u64, QueuedRequest)> = records
            .iter()
            .filter(|(_, r)| r.state == RequestState::Queued)
            .map(|(id, r)| {
                (
                    r.sequence,
                    QueuedRequest {
                        request_id: id.clone(),
                        filename: r.filename.clone(),
                        template_id: r.template_id.clone(),
                        submitted_at: r.submitted_at,
                    },
                )
            })
            .collect();
        queued.sort_by_key(|(sequence, _)| *sequence);
        queued.into_iter().map(|(_, q)| q).collect()
    }

    /// Evict finished records older than the retention window
    pub async fn sweep_expired(&self) -> usize {
        self.shared.sweep_expired().await
    }

    pub async fn stats(&self) -> EngineStats {
        let records = self.shared.records.read().await;
        let count = |state: RequestState| records.values().filter(|r| r.state == state).count();
        let counters = &self.shared.counters;
        let processed = counters.processed.load(Ordering::Relaxed);

        EngineStats {
            workers: self.shared.settings.worker_count.max(1),
            queue_capacity: self.shared.settings.queue_capacity,
            submitted: counters.submitted.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            timed_out: counters.timed_out.load(Ordering::Relaxed),
            abandoned: counters.abandoned.load(Ordering::Relaxed),
            queued: count(RequestState::Queued),
            running: count(RequestState::Running),
            retained: records.len(),
            average_processing_ms: if processed == 0 {
                0.0
            } else {
                counters.processing_ms.load(Ordering::Relaxed) as f64 / processed as f64
            },
        }
    }

    /// Stop accepting work, let the workers drain the queue, then stop them
    pub async fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Review engine shutting down");
        self.sender.write().await.take();

        let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Review worker ended abnormally");
            }
        }
        self.sweeper.abort();
        info!("Review engine stopped");
    }
}

impl Drop for ReviewEngine {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panicking_stage_becomes_internal_error() {
        let err = run_blocking("req-1", "validation", || -> u32 { panic!("check exploded") })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "internal");
        assert!(err.to_string().contains("validation task failed"), "{}", err);

        let value = run_blocking("req-1", "validation", || 7).await.unwrap();
        assert_eq!(value, 7);
    }
}
