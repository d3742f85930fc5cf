use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CompletenessLevel, ConfidenceLevel, EvidenceQuality, SourceKind};
use super::evidence::RetrievalOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisCandidate {
    pub id: Uuid,
    pub name: String,
    pub icd10_code: Option<String>,
    /// Model-reported confidence after clamping to [0, 1].
    pub raw_confidence: f64,
    /// Final confidence after evidence, retrieval and ceiling adjustments.
    pub confidence: f64,
    pub reasoning: String,
    /// Evidence ids, all present in the composed context.
    pub supporting_evidence: Vec<String>,
    pub recommended_tests: Vec<String>,
    pub treatment_suggestions: Vec<String>,
    pub red_flags: Vec<String>,
    pub contradicting_factors: Vec<String>,
    pub evidence_quality: EvidenceQuality,
}

/// Ranked differential. Never mutated after it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialDiagnosisResult {
    pub id: Uuid,
    pub candidates: Vec<DiagnosisCandidate>,
    pub completeness: CompletenessLevel,
    pub source_outcomes: BTreeMap<SourceKind, RetrievalOutcome>,
    pub clinical_reasoning: String,
    pub missing_information: Vec<String>,
    pub follow_up: Vec<String>,
    pub confidence_level: ConfidenceLevel,
    pub advisory_notes: Vec<String>,
    pub weights_version: u64,
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl DifferentialDiagnosisResult {
    pub fn top(&self) -> Option<&DiagnosisCandidate> {
        self.candidates.first()
    }
}
