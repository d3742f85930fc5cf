//! End-to-end differential generation:
//! validate → classify → retrieve (parallel) → compose → synthesize → rank.
//!
//! Only retrieval is concurrent. Dropping the returned future cancels
//! whatever stage is in flight, including a pending provider call.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::audit::{AuditRecord, AuditSink};
use super::context::{compose, ComposerSettings};
use super::degradation::{classify, missing_inputs, validate, ValidationError};
use super::feedback::ledger::DiagnosisLedger;
use super::ranking::{rank, RankingInput};
use super::retrieval::RetrievalCoordinator;
use super::synthesis::{DiagnosisSynthesizer, SynthesisError};
use crate::models::{ClinicalQuery, DifferentialDiagnosisResult};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Invalid clinical query: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("Request exceeded its {}ms deadline", .0.as_millis())]
    DeadlineExceeded(Duration),
}

pub struct DifferentialPipeline {
    coordinator: RetrievalCoordinator,
    synthesizer: DiagnosisSynthesizer,
    composer: ComposerSettings,
    ledger: Arc<DiagnosisLedger>,
    audit: Option<Arc<dyn AuditSink>>,
    deadline: Option<Duration>,
}

impl DifferentialPipeline {
    pub fn new(
        coordinator: RetrievalCoordinator,
        synthesizer: DiagnosisSynthesizer,
        composer: ComposerSettings,
        ledger: Arc<DiagnosisLedger>,
    ) -> Self {
        Self {
            coordinator,
            synthesizer,
            composer,
            ledger,
            audit: None,
            deadline: None,
        }
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn ledger(&self) -> &Arc<DiagnosisLedger> {
        &self.ledger
    }

    /// Generate a ranked differential for `query`.
    ///
    /// Invalid queries fail before any source is contacted. Source failures
    /// never fail the request; only synthesis exhaustion or the overall
    /// deadline do.
    pub async fn generate_differential(
        &self,
        query: ClinicalQuery,
    ) -> Result<DifferentialDiagnosisResult, PipelineError> {
        if let Err(e) = validate(&query) {
            tracing::info!(kind = validation_kind(&e), "Clinical query rejected");
            return Err(e.into());
        }

        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run(&query))
                .await
                .map_err(|_| {
                    tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Differential deadline exceeded");
                    PipelineError::DeadlineExceeded(deadline)
                })?,
            None => self.run(&query).await,
        }
    }

    async fn run(&self, query: &ClinicalQuery) -> Result<DifferentialDiagnosisResult, PipelineError> {
        let started = tokio::time::Instant::now();
        let completeness = classify(query);
        let missing = missing_inputs(query);
        let span = tracing::info_span!("generate_differential", completeness = %completeness);

        async move {
            let report = self
                .coordinator
                .retrieve(query)
                .instrument(tracing::info_span!("retrieve"))
                .await;

            let context = compose(query, &report.evidence, completeness, self.composer);
            tracing::debug!(
                evidence = context.evidence_count(),
                dropped = context.dropped_evidence.len(),
                below_threshold = context.below_threshold,
                chars = context.total_chars,
                "Context composed"
            );

            let synthesis = self
                .synthesizer
                .synthesize(&context)
                .instrument(tracing::info_span!("synthesize"))
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "Synthesis failed");
                    e
                })?;

            let mut result = rank(
                RankingInput {
                    synthesis: &synthesis,
                    context: &context,
                    outcomes: &report.outcomes,
                    completeness,
                    weights: &report.weights,
                    missing_inputs: &missing,
                },
                Uuid::new_v4(),
            );
            result.duration_ms = started.elapsed().as_millis() as u64;

            self.ledger.register(&result, &context);
            if let Some(audit) = &self.audit {
                audit.emit(AuditRecord::new(
                    query,
                    &result,
                    &context,
                    &report.weights,
                    synthesis.attempts,
                ));
            }

            tracing::info!(
                result_id = %result.id,
                candidates = result.candidates.len(),
                confidence_level = %result.confidence_level,
                attempts = synthesis.attempts,
                duration_ms = result.duration_ms,
                "Differential generated"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }
}

/// Variant name only; the error text can carry patient values.
fn validation_kind(e: &ValidationError) -> &'static str {
    match e {
        ValidationError::EmptyComplaint => "empty_complaint",
        ValidationError::NoSymptoms => "no_symptoms",
        ValidationError::BlankSymptomName { .. } => "blank_symptom_name",
        ValidationError::NonFiniteVital { .. } => "non_finite_vital",
        ValidationError::ImplausibleVital { .. } => "implausible_vital",
        ValidationError::NonFiniteLab { .. } => "non_finite_lab",
        ValidationError::ImplausibleAge(_) => "implausible_age",
    }
}
