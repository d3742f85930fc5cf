//! Shared service state.
//!
//! `CoreState` owns the pipeline, the source weights and the feedback log.
//! It is wrapped in `Arc` at startup and shared by every HTTP handler. The
//! only cross-request mutable state is the weight store and the append-only
//! feedback and ledger logs, all internally synchronised.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ClinicalQuery, DifferentialDiagnosisResult, FeedbackAck, FeedbackRating, FeedbackStats,
    SourceKind,
};
use crate::pipeline::audit::{AuditSink, ChannelAuditSink};
use crate::pipeline::context::ComposerSettings;
use crate::pipeline::feedback::{
    DiagnosisLedger, FeedbackError, FeedbackIngestor, SourceWeightState, WeightSnapshot,
};
use crate::pipeline::patient::{InMemoryPatientStore, PatientStore};
use crate::pipeline::retrieval::{
    EvidenceAdapter, GuidelineCatalog, HashingEmbedder, PubMedClient, RetrievalCoordinator,
    RetrievalError, SearchLimits, VectorIndex, EMBEDDING_DIM,
};
use crate::pipeline::synthesis::{
    DiagnosisSynthesizer, OllamaReasoner, ProviderError, ReasoningProvider,
};
use crate::pipeline::{DifferentialPipeline, PipelineError};
use crate::pipeline_config::PipelineConfig;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Evidence source setup failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Reasoning provider setup failed: {0}")]
    Provider(#[from] ProviderError),
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: PipelineConfig,
    pipeline: DifferentialPipeline,
    weights: Arc<SourceWeightState>,
    feedback: FeedbackIngestor,
    patients: Arc<dyn PatientStore>,
    sources: Vec<SourceKind>,
    started_at: Instant,
}

impl CoreState {
    /// Assemble the state from already-built collaborators.
    pub fn new(
        config: PipelineConfig,
        adapters: Vec<EvidenceAdapter>,
        provider: Arc<dyn ReasoningProvider>,
        patients: Arc<dyn PatientStore>,
        audit: Option<Arc<dyn AuditSink>>,
    ) -> Self {
        let weights = Arc::new(SourceWeightState::new());
        let ledger = Arc::new(DiagnosisLedger::with_capacity(config.ledger_capacity));

        let coordinator = RetrievalCoordinator::new(
            adapters,
            config.source_timeouts,
            SearchLimits {
                literature_max_results: config.literature_max_results,
                vector_top_k: config.vector_top_k,
            },
            weights.clone(),
        )
        .with_literature_indexing(config.index_literature_hits);
        let sources = coordinator.sources();
        let synthesizer =
            DiagnosisSynthesizer::new(provider, config.max_synthesis_retries, config.max_candidates);
        let composer = ComposerSettings {
            budget_chars: config.context_budget_chars,
            min_relevance: config.min_relevance,
        };

        let mut pipeline = DifferentialPipeline::new(coordinator, synthesizer, composer, ledger.clone())
            .with_deadline(config.request_deadline);
        if let Some(sink) = audit {
            pipeline = pipeline.with_audit(sink);
        }

        let feedback = FeedbackIngestor::new(ledger, weights.clone(), config.feedback_alpha)
            .with_log_capacity(config.feedback_log_capacity);

        Self {
            config,
            pipeline,
            weights,
            feedback,
            patients,
            sources,
            started_at: Instant::now(),
        }
    }

    /// Build the production collaborators described by `config`.
    ///
    /// Must run inside a tokio runtime: the audit writer is spawned here.
    pub fn from_config(config: PipelineConfig) -> Result<Self, CoreError> {
        let literature = PubMedClient::new(
            &config.pubmed_base_url,
            config.pubmed_api_key.clone(),
            config.source_timeouts.literature,
        )?;

        let embedder = Arc::new(HashingEmbedder::new(EMBEDDING_DIM));
        let vector = match &config.corpus_path {
            Some(path) => VectorIndex::load_json(path, embedder, config.vector_min_similarity)?,
            None => {
                tracing::warn!("No vector corpus configured; vector source will return nothing");
                VectorIndex::new(embedder, config.vector_min_similarity)
            }
        };

        let adapters = vec![
            EvidenceAdapter::Literature(Arc::new(literature)),
            EvidenceAdapter::Vector(Arc::new(vector)),
            EvidenceAdapter::Guideline(Arc::new(GuidelineCatalog::standard())),
        ];

        let provider = OllamaReasoner::new(
            &config.ollama_url,
            &config.ollama_model,
            config.provider_timeout,
        )?;
        tracing::info!(model = provider.model(), "Reasoning provider configured");

        let (audit, _writer) = ChannelAuditSink::spawn(config.audit_log_path.clone());
        if let Some(path) = &config.audit_log_path {
            tracing::info!(path = %path.display(), "Audit log enabled");
        }

        Ok(Self::new(
            config,
            adapters,
            Arc::new(provider),
            Arc::new(InMemoryPatientStore::new()),
            Some(Arc::new(audit)),
        ))
    }

    /// Run the pipeline. With a `patient_id`, stored history fills a query
    /// that carries none.
    pub async fn generate_differential(
        &self,
        mut query: ClinicalQuery,
        patient_id: Option<&str>,
    ) -> Result<DifferentialDiagnosisResult, PipelineError> {
        if let Some(id) = patient_id {
            if !query.has_history() {
                match self.patients.patient_context(id) {
                    Some(history) => query.history = Some(history),
                    None => tracing::debug!("No stored record for patient"),
                }
            }
        }
        self.pipeline.generate_differential(query).await
    }

    pub fn record_feedback(
        &self,
        diagnosis_id: Uuid,
        rating: FeedbackRating,
        correction: Option<String>,
    ) -> Result<FeedbackAck, FeedbackError> {
        self.feedback.record_feedback(diagnosis_id, rating, correction)
    }

    pub fn feedback_stats(&self) -> FeedbackStats {
        self.feedback.feedback_stats()
    }

    pub fn weights(&self) -> WeightSnapshot {
        self.weights.snapshot()
    }

    pub fn sources(&self) -> &[SourceKind] {
        &self.sources
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn audit_log_path(&self) -> Option<&PathBuf> {
        self.config.audit_log_path.as_ref()
    }
}
