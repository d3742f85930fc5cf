use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use uuid::Uuid;

use crate::models::{DifferentialDiagnosisResult, SourceKind};
use crate::pipeline::context::ComposedContext;

/// Candidates remembered when no capacity is given.
pub const DEFAULT_LEDGER_CAPACITY: usize = 10_000;

/// What feedback needs to know about a past candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateProvenance {
    pub result_id: Uuid,
    /// Distinct sources of the evidence the candidate cited.
    pub cited_sources: Vec<SourceKind>,
}

#[derive(Debug, Default)]
struct LedgerEntries {
    by_id: HashMap<Uuid, CandidateProvenance>,
    /// Insertion order, oldest first.
    order: VecDeque<Uuid>,
}

/// Index from candidate id to the sources it cited.
///
/// Written once per generated result, read by feedback ingestion. Holds at
/// most `capacity` candidates; the oldest are evicted first, after which
/// feedback on them is rejected as unknown.
#[derive(Debug)]
pub struct DiagnosisLedger {
    entries: RwLock<LedgerEntries>,
    capacity: usize,
}

impl Default for DiagnosisLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LEDGER_CAPACITY)
    }
}

impl DiagnosisLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(LedgerEntries::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record every candidate of `result`, resolving citations through the
    /// context the result was generated from.
    pub fn register(&self, result: &DifferentialDiagnosisResult, context: &ComposedContext) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for candidate in &result.candidates {
            let mut cited_sources: Vec<SourceKind> = candidate
                .supporting_evidence
                .iter()
                .filter_map(|id| context.evidence_source(id))
                .collect();
            cited_sources.sort();
            cited_sources.dedup();
            let provenance = CandidateProvenance {
                result_id: result.id,
                cited_sources,
            };
            if entries.by_id.insert(candidate.id, provenance).is_none() {
                entries.order.push_back(candidate.id);
            }
        }

        let mut evicted = 0usize;
        while entries.by_id.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.by_id.remove(&oldest);
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(evicted, capacity = self.capacity, "Ledger evicted oldest candidates");
        }
    }

    pub fn lookup(&self, candidate_id: &Uuid) -> Option<CandidateProvenance> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.by_id.get(candidate_id).cloned()
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.by_id.len(),
            Err(poisoned) => poisoned.into_inner().by_id.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ClinicalQuery, CompletenessLevel, ConfidenceLevel, DiagnosisCandidate, Evidence,
        EvidenceQuality, Severity, Symptom,
    };
    use crate::pipeline::context::{compose, ComposerSettings};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn context() -> ComposedContext {
        let query = ClinicalQuery::new("cough", vec![Symptom::new("cough", Severity::Mild)]);
        let evidence = vec![
            Evidence::new(SourceKind::Guideline, "guideline:cap-idsa-ats", "CAP", 0.9),
            Evidence::new(SourceKind::Literature, "pmid:1", "trial", 0.8),
        ];
        compose(
            &query,
            &evidence,
            CompletenessLevel::Minimal,
            ComposerSettings {
                budget_chars: 12_000,
                min_relevance: 0.3,
            },
        )
    }

    fn result_with(count: usize, refs: &[&str]) -> DifferentialDiagnosisResult {
        let candidates = (0..count)
            .map(|i| DiagnosisCandidate {
                id: Uuid::new_v4(),
                name: format!("D{i}"),
                icd10_code: None,
                raw_confidence: 0.5,
                confidence: 0.5,
                reasoning: "r".into(),
                supporting_evidence: refs.iter().map(|r| r.to_string()).collect(),
                recommended_tests: vec![],
                treatment_suggestions: vec![],
                red_flags: vec![],
                contradicting_factors: vec![],
                evidence_quality: EvidenceQuality::Moderate,
            })
            .collect();
        DifferentialDiagnosisResult {
            id: Uuid::new_v4(),
            candidates,
            completeness: CompletenessLevel::Minimal,
            source_outcomes: BTreeMap::new(),
            clinical_reasoning: String::new(),
            missing_information: vec![],
            follow_up: vec![],
            confidence_level: ConfidenceLevel::Moderate,
            advisory_notes: vec![],
            weights_version: 0,
            generated_at: Utc::now(),
            duration_ms: 0,
        }
    }

    #[test]
    fn cited_sources_are_sorted_and_distinct() {
        let ledger = DiagnosisLedger::new();
        let result = result_with(1, &["pmid:1", "guideline:cap-idsa-ats", "pmid:1"]);
        ledger.register(&result, &context());
        let provenance = ledger.lookup(&result.candidates[0].id).unwrap();
        assert_eq!(provenance.result_id, result.id);
        assert_eq!(
            provenance.cited_sources,
            vec![SourceKind::Literature, SourceKind::Guideline]
        );
    }

    #[test]
    fn oldest_candidates_evicted_past_capacity() {
        let ledger = DiagnosisLedger::with_capacity(6);
        let first = result_with(5, &["pmid:1"]);
        let second = result_with(5, &[]);
        ledger.register(&first, &context());
        ledger.register(&second, &context());

        assert_eq!(ledger.len(), 6);
        for evicted in &first.candidates[..4] {
            assert!(ledger.lookup(&evicted.id).is_none());
        }
        assert!(ledger.lookup(&first.candidates[4].id).is_some());
        for kept in &second.candidates {
            assert!(ledger.lookup(&kept.id).is_some());
        }
    }

    #[test]
    fn re_registering_does_not_duplicate_order() {
        let ledger = DiagnosisLedger::with_capacity(2);
        let result = result_with(2, &[]);
        ledger.register(&result, &context());
        ledger.register(&result, &context());
        assert_eq!(ledger.len(), 2);
        assert!(ledger.lookup(&result.candidates[0].id).is_some());
    }
}
