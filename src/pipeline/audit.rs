//! Audit trail of generated differentials.
//!
//! Emission is fire-and-forget: the pipeline hands a record to the sink and
//! never waits on it. Records identify the query by a SHA-256 fingerprint;
//! patient text itself is never written.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::context::ComposedContext;
use super::feedback::weights::WeightSnapshot;
use crate::models::{
    ClinicalQuery, CompletenessLevel, DifferentialDiagnosisResult, RetrievalOutcome, SourceKind,
};

/// Receives audit records. Must not block the caller.
pub trait AuditSink: Send + Sync {
    fn emit(&self, record: AuditRecord);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditCandidate {
    pub id: Uuid,
    pub name: String,
    pub icd10_code: Option<String>,
    pub raw_confidence: f64,
    pub confidence: f64,
    pub supporting_evidence: Vec<String>,
}

/// What went into the reasoning context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextTrace {
    pub evidence_ids: Vec<String>,
    pub dropped_evidence: Vec<String>,
    pub below_threshold: usize,
    pub total_chars: usize,
    pub budget_chars: usize,
    pub patient_truncated: bool,
}

impl From<&ComposedContext> for ContextTrace {
    fn from(context: &ComposedContext) -> Self {
        Self {
            evidence_ids: context.evidence_ids().map(str::to_string).collect(),
            dropped_evidence: context.dropped_evidence.clone(),
            below_threshold: context.below_threshold,
            total_chars: context.total_chars,
            budget_chars: context.budget_chars,
            patient_truncated: context.patient_truncated,
        }
    }
}

/// Full retrieval and ranking trace of one generated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub result_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub query_fingerprint: String,
    pub completeness: CompletenessLevel,
    pub source_outcomes: BTreeMap<SourceKind, RetrievalOutcome>,
    pub weights: WeightSnapshot,
    pub context: ContextTrace,
    pub synthesis_attempts: u32,
    pub candidates: Vec<AuditCandidate>,
    pub advisory_notes: Vec<String>,
    pub duration_ms: u64,
}

impl AuditRecord {
    pub fn new(
        query: &ClinicalQuery,
        result: &DifferentialDiagnosisResult,
        context: &ComposedContext,
        weights: &WeightSnapshot,
        synthesis_attempts: u32,
    ) -> Self {
        Self {
            result_id: result.id,
            recorded_at: Utc::now(),
            query_fingerprint: query_fingerprint(query),
            completeness: result.completeness,
            source_outcomes: result.source_outcomes.clone(),
            weights: weights.clone(),
            context: ContextTrace::from(context),
            synthesis_attempts,
            candidates: result
                .candidates
                .iter()
                .map(|c| AuditCandidate {
                    id: c.id,
                    name: c.name.clone(),
                    icd10_code: c.icd10_code.clone(),
                    raw_confidence: c.raw_confidence,
                    confidence: c.confidence,
                    supporting_evidence: c.supporting_evidence.clone(),
                })
                .collect(),
            advisory_notes: result.advisory_notes.clone(),
            duration_ms: result.duration_ms,
        }
    }
}

/// Hex SHA-256 of the query's canonical JSON form.
pub fn query_fingerprint(query: &ClinicalQuery) -> String {
    let bytes = serde_json::to_vec(query).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Sink that forwards records to a background task.
///
/// The task logs each record at target `audit` and, when configured,
/// appends it as one JSON line to a file. It exits once every sender is
/// dropped and the queue is drained.
#[derive(Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::UnboundedSender<AuditRecord>,
}

impl ChannelAuditSink {
    /// Must be called inside a tokio runtime.
    pub fn spawn(log_path: Option<PathBuf>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_audit_writer(rx, log_path));
        (Self { tx }, handle)
    }
}

impl AuditSink for ChannelAuditSink {
    fn emit(&self, record: AuditRecord) {
        if self.tx.send(record).is_err() {
            tracing::warn!(target: "audit", "Audit writer stopped; record discarded");
        }
    }
}

async fn run_audit_writer(mut rx: mpsc::UnboundedReceiver<AuditRecord>, log_path: Option<PathBuf>) {
    let mut file = match &log_path {
        Some(path) => match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
        {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::error!(target: "audit", path = %path.display(), error = %e, "Cannot open audit log");
                None
            }
        },
        None => None,
    };

    while let Some(record) = rx.recv().await {
        tracing::info!(
            target: "audit",
            result_id = %record.result_id,
            fingerprint = %record.query_fingerprint,
            completeness = %record.completeness,
            candidates = record.candidates.len(),
            evidence = record.context.evidence_ids.len(),
            attempts = record.synthesis_attempts,
            duration_ms = record.duration_ms,
            "Differential generated"
        );

        if let Some(f) = file.as_mut() {
            let mut line = match serde_json::to_string(&record) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(target: "audit", error = %e, "Audit record not serializable");
                    continue;
                }
            };
            line.push('\n');
            if let Err(e) = f.write_all(line.as_bytes()).await {
                tracing::warn!(target: "audit", error = %e, "Audit log write failed");
            }
        }
    }

    if let Some(mut f) = file {
        let _ = f.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceLevel, Severity, Symptom};
    use crate::pipeline::context::{compose, ComposerSettings};

    fn query() -> ClinicalQuery {
        ClinicalQuery::new("cough and fever", vec![Symptom::new("cough", Severity::Moderate)])
    }

    fn record() -> AuditRecord {
        let query = query();
        let context = compose(
            &query,
            &[],
            CompletenessLevel::Minimal,
            ComposerSettings {
                budget_chars: 12_000,
                min_relevance: 0.3,
            },
        );
        let result = DifferentialDiagnosisResult {
            id: Uuid::new_v4(),
            candidates: vec![],
            completeness: CompletenessLevel::Minimal,
            source_outcomes: BTreeMap::new(),
            clinical_reasoning: String::new(),
            missing_information: vec![],
            follow_up: vec![],
            confidence_level: ConfidenceLevel::Low,
            advisory_notes: vec!["no supporting evidence retrieved".into()],
            weights_version: 0,
            generated_at: Utc::now(),
            duration_ms: 12,
        };
        AuditRecord::new(&query, &result, &context, &WeightSnapshot::neutral(), 1)
    }

    #[test]
    fn fingerprint_is_stable_hex_and_hides_text() {
        let a = query_fingerprint(&query());
        let b = query_fingerprint(&query());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

        let other = ClinicalQuery::new("headache", vec![Symptom::new("nausea", Severity::Mild)]);
        assert_ne!(a, query_fingerprint(&other));
    }

    #[test]
    fn record_carries_no_patient_text() {
        let json = serde_json::to_string(&record()).unwrap();
        assert!(!json.contains("cough and fever"));
    }

    #[tokio::test]
    async fn channel_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let (sink, handle) = ChannelAuditSink::spawn(Some(path.clone()));
        let first = record();
        let second = record();
        sink.emit(first.clone());
        sink.emit(second.clone());
        drop(sink);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<AuditRecord> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].result_id, first.result_id);
        assert_eq!(lines[1].result_id, second.result_id);
    }

    #[tokio::test]
    async fn emit_after_writer_stops_does_not_panic() {
        let (sink, handle) = ChannelAuditSink::spawn(None);
        handle.abort();
        let _ = handle.await;
        sink.emit(record());
    }
}
