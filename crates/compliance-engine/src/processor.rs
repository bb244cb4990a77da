//! Validation of analyzed documents against registered templates

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{ComplianceStatus, Document, Finding, LocationHint, ReviewSummary};
use tracing::{debug, info, instrument, warn};

use crate::error::ComplianceError;
use crate::patterns::extract_snippet;
use crate::policy::StatusPolicy;
use crate::recommendations;
use crate::scoring::compute_score;
use crate::store::{CompiledRequirement, TemplateStore};

fn default_true() -> bool {
    true
}

/// Per-call knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Minimum confidence for a requirement to count as matched
    #[serde(default)]
    pub min_confidence: f64,
    /// Evaluate requirements marked optional
    #[serde(default = "default_true")]
    pub run_optional: bool,
    /// Date that future-dated declarations are judged against; today if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            run_optional: true,
            reference_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub document_id: String,
    pub template_id: String,
    pub template_name: String,
    pub template_version: String,
    pub status: ComplianceStatus,
    pub compliance_score: f64,
    /// In template declaration order
    pub findings: Vec<Finding>,
    pub summary: ReviewSummary,
    pub recommendations: Vec<String>,
    pub processing_ms: u64,
    pub validated_at: DateTime<Utc>,
}

impl ValidationResult {
    pub fn finding(&self, requirement_id: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.requirement_id == requirement_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub validations: u64,
    pub template_not_found: u64,
    pub passed: u64,
    pub warning: u64,
    pub failed: u64,
    pub total_processing_ms: u64,
}

#[derive(Default)]
struct Counters {
    validations: AtomicU64,
    not_found: AtomicU64,
    passed: AtomicU64,
    warning: AtomicU64,
    failed: AtomicU64,
    processing_ms: AtomicU64,
}

/// Evaluates documents against templates from a shared [`TemplateStore`].
///
/// Validation is a pure function of the document text, the template, the
/// options and the reference date.
pub struct TemplateProcessor {
    store: Arc<TemplateStore>,
    policy: StatusPolicy,
    counters: Counters,
}

impl TemplateProcessor {
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self::with_policy(store, StatusPolicy::default())
    }

    pub fn with_policy(store: Arc<TemplateStore>, policy: StatusPolicy) -> Self {
        Self {
            store,
            policy,
            counters: Counters::default(),
        }
    }

    pub fn store(&self) -> &Arc<TemplateStore> {
        &self.store
    }

    pub fn policy(&self) -> &StatusPolicy {
        &self.policy
    }

    #[instrument(skip(self, document, options), fields(document_id = %document.id))]
    pub fn validate(
        &self,
        document: &Document,
        template_id: &str,
        options: &ValidationOptions,
    ) -> Result<ValidationResult, ComplianceError> {
        let started = Instant::now();
        let compiled = match self.store.compiled(template_id) {
            Ok(compiled) => compiled,
            Err(e) => {
                self.counters.not_found.fetch_add(1, Ordering::Relaxed);
                warn!(template_id, "Unknown template requested");
                return Err(e);
            }
        };

        let today = options
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let evaluated: Vec<(&CompiledRequirement, Finding)> = compiled
            .requirements
            .iter()
            .filter(|r| options.run_optional || r.requirement.required)
            .map(|r| (r, evaluate(r, document, options, today)))
            .collect();

        let compliance_score = compute_score(
            evaluated
                .iter()
                .map(|(r, f)| (r.requirement.weight, f.matched)),
        );
        let findings: Vec<Finding> = evaluated.into_iter().map(|(_, f)| f).collect();
        let status = self.policy.overall(&findings);
        let summary = ReviewSummary::from_findings(&findings);
        let recommendations = recommendations::build(&findings, compliance_score);
        let processing_ms = started.elapsed().as_millis() as u64;

        self.counters.validations.fetch_add(1, Ordering::Relaxed);
        self.counters.processing_ms.fetch_add(processing_ms, Ordering::Relaxed);
        let bucket = match status {
            ComplianceStatus::Passed => &self.counters.passed,
            ComplianceStatus::Warning => &self.counters.warning,
            ComplianceStatus::Failed => &self.counters.failed,
        };
        bucket.fetch_add(1, Ordering::Relaxed);

        info!(
            template_id,
            score = compliance_score,
            status = %status,
            matched = summary.matched,
            unmatched = summary.unmatched,
            "Validation complete"
        );

        Ok(ValidationResult {
            document_id: document.id.clone(),
            template_id: compiled.template.id.clone(),
            template_name: compiled.template.name.clone(),
            template_version: compiled.template.version.clone(),
            status,
            compliance_score,
            findings,
            summary,
            recommendations,
            processing_ms,
            validated_at: Utc::now(),
        })
    }

    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            validations: self.counters.validations.load(Ordering::Relaxed),
            template_not_found: self.counters.not_found.load(Ordering::Relaxed),
            passed: self.counters.passed.load(Ordering::Relaxed),
            warning: self.counters.warning.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            total_processing_ms: self.counters.processing_ms.load(Ordering::Relaxed),
        }
    }
}

fn evaluate(
    compiled: &CompiledRequirement,
    document: &Document,
    options: &ValidationOptions,
    today: NaiveDate,
) -> Finding {
    let requirement = &compiled.requirement;
    let text = document.text.as_str();

    let mut match_count = 0;
    let mut confidence: f64 = 0.0;
    let mut first: Option<(usize, usize)> = None;
    for pattern in &compiled.patterns {
        if let Some(m) = pattern.find(text) {
            match_count += m.count;
            confidence = confidence.max(pattern.confidence(m.count));
            if first.map_or(true, |(start, _)| m.start < start) {
                first = Some((m.start, m.end));
            }
        }
    }

    let mut notes = Vec::new();
    let mut matched = match_count > 0;
    if matched && confidence < options.min_confidence {
        notes.push(format!(
            "Match confidence {:.2} is below the required {:.2}",
            confidence, options.min_confidence
        ));
        matched = false;
    }

    let location = first.map(|(start, end)| LocationHint {
        start_offset: start,
        end_offset: end,
        page: document.page_at(start),
        snippet: extract_snippet(text, start, end),
    });

    if let (true, Some(span)) = (matched, first) {
        notes.extend(compiled.checks.iter().filter_map(|c| c.evaluate(text, span, today)));
    }

    debug!(
        requirement_id = %requirement.id,
        matched,
        match_count,
        confidence,
        "Requirement evaluated"
    );

    Finding {
        requirement_id: requirement.id.clone(),
        title: requirement.title.clone(),
        category: requirement.category.clone(),
        severity: requirement.severity,
        required: requirement.required,
        matched,
        confidence,
        match_count,
        location,
        recommendation: if matched {
            None
        } else {
            requirement.recommendation.clone()
        },
        notes,
    }
}
