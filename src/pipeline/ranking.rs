//! Confidence normalisation and final ordering.
//!
//! The normalised confidence of a candidate is a pure function of its raw
//! confidence, the number of evidence items it cites, the fraction of
//! sources that answered, and the mean weight of the cited sources. Two
//! ceilings then apply: one for candidates citing nothing, one for the
//! completeness level of the query.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use super::context::ComposedContext;
use super::feedback::weights::WeightSnapshot;
use super::synthesis::{Synthesis, SynthesizedCandidate};
use crate::models::{
    CompletenessLevel, ConfidenceLevel, DiagnosisCandidate, DifferentialDiagnosisResult,
    EvidenceQuality, RetrievalOutcome, SourceKind, SourceStatus,
};

/// Ceiling for candidates that cite no evidence at all.
pub const UNSUPPORTED_CONFIDENCE_CEILING: f64 = 0.6;

const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.7;
const MODERATE_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// References beyond this count add no further support.
const SUPPORT_SATURATION: usize = 3;
const SUPPORT_BASE: f64 = 0.85;
const SUPPORT_STEP: f64 = 0.05;
const RETRIEVAL_BASE: f64 = 0.85;
const WEIGHT_SENSITIVITY: f64 = 0.1;
const WEIGHT_FACTOR_MIN: f64 = 0.9;
const WEIGHT_FACTOR_MAX: f64 = 1.1;

pub fn completeness_ceiling(level: CompletenessLevel) -> f64 {
    match level {
        CompletenessLevel::Minimal => 0.85,
        CompletenessLevel::Partial => 0.95,
        CompletenessLevel::Full => 1.0,
    }
}

/// Everything ranking reads. Borrowed so the same inputs can be re-ranked.
#[derive(Debug, Clone, Copy)]
pub struct RankingInput<'a> {
    pub synthesis: &'a Synthesis,
    pub context: &'a ComposedContext,
    pub outcomes: &'a BTreeMap<SourceKind, RetrievalOutcome>,
    pub completeness: CompletenessLevel,
    pub weights: &'a WeightSnapshot,
    pub missing_inputs: &'a [&'static str],
}

/// Build the ranked result. Candidate ids derive from `result_id`, so the
/// same inputs and id always produce the same candidates.
pub fn rank(input: RankingInput<'_>, result_id: Uuid) -> DifferentialDiagnosisResult {
    let ok_fraction = ok_fraction(input.outcomes);

    let mut scored: Vec<DiagnosisCandidate> = input
        .synthesis
        .candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let cited: Vec<SourceKind> = candidate
                .supporting_evidence
                .iter()
                .filter_map(|id| input.context.evidence_source(id))
                .collect();
            let confidence = normalized_confidence(
                candidate.raw_confidence,
                &cited,
                ok_fraction,
                input.weights,
                input.completeness,
            );
            build_candidate(result_id, index, candidate, confidence, evidence_quality(&cited))
        })
        .collect();

    // sort_by is stable: equal confidences keep model order.
    scored.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let confidence_level = confidence_level(scored.first().map(|c| c.confidence));
    let advisory_notes = advisory_notes(&input);

    DifferentialDiagnosisResult {
        id: result_id,
        candidates: scored,
        completeness: input.completeness,
        source_outcomes: input.outcomes.clone(),
        clinical_reasoning: input.synthesis.clinical_reasoning.clone(),
        missing_information: input.synthesis.missing_information.clone(),
        follow_up: input.synthesis.follow_up.clone(),
        confidence_level,
        advisory_notes,
        weights_version: input.weights.version,
        generated_at: Utc::now(),
        duration_ms: 0,
    }
}

/// Normalised confidence for one candidate.
///
/// `cited` holds the source of every cited evidence item (duplicates
/// included), so a source cited twice counts twice in the mean weight.
pub fn normalized_confidence(
    raw_confidence: f64,
    cited: &[SourceKind],
    ok_fraction: f64,
    weights: &WeightSnapshot,
    completeness: CompletenessLevel,
) -> f64 {
    let base = if raw_confidence.is_finite() {
        raw_confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let refs = cited.len();
    let support = if refs == 0 {
        1.0
    } else {
        SUPPORT_BASE + SUPPORT_STEP * refs.min(SUPPORT_SATURATION) as f64
    };
    let retrieval = RETRIEVAL_BASE + (1.0 - RETRIEVAL_BASE) * ok_fraction.clamp(0.0, 1.0);
    let weight = if refs == 0 {
        1.0
    } else {
        let mean = cited.iter().map(|k| weights.get(*k)).sum::<f64>() / refs as f64;
        (1.0 + WEIGHT_SENSITIVITY * (mean - 1.0)).clamp(WEIGHT_FACTOR_MIN, WEIGHT_FACTOR_MAX)
    };

    let mut confidence = (base * support * retrieval * weight).clamp(0.0, 1.0);
    if refs == 0 {
        confidence = confidence.min(UNSUPPORTED_CONFIDENCE_CEILING);
    }
    confidence.min(completeness_ceiling(completeness))
}

pub fn evidence_quality(cited: &[SourceKind]) -> EvidenceQuality {
    if cited.is_empty() {
        EvidenceQuality::Low
    } else if cited.contains(&SourceKind::Guideline) || cited.len() >= SUPPORT_SATURATION {
        EvidenceQuality::High
    } else {
        EvidenceQuality::Moderate
    }
}

pub fn confidence_level(top: Option<f64>) -> ConfidenceLevel {
    match top {
        Some(c) if c >= HIGH_CONFIDENCE_THRESHOLD => ConfidenceLevel::High,
        Some(c) if c >= MODERATE_CONFIDENCE_THRESHOLD => ConfidenceLevel::Moderate,
        _ => ConfidenceLevel::Low,
    }
}

fn ok_fraction(outcomes: &BTreeMap<SourceKind, RetrievalOutcome>) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let ok = outcomes.values().filter(|o| o.is_ok()).count();
    ok as f64 / outcomes.len() as f64
}

fn build_candidate(
    result_id: Uuid,
    index: usize,
    candidate: &SynthesizedCandidate,
    confidence: f64,
    evidence_quality: EvidenceQuality,
) -> DiagnosisCandidate {
    let key = format!("{index}:{}", candidate.name);
    DiagnosisCandidate {
        id: Uuid::new_v5(&result_id, key.as_bytes()),
        name: candidate.name.clone(),
        icd10_code: candidate.icd10_code.clone(),
        raw_confidence: candidate.raw_confidence,
        confidence,
        reasoning: candidate.reasoning.clone(),
        supporting_evidence: candidate.supporting_evidence.clone(),
        recommended_tests: candidate.recommended_tests.clone(),
        treatment_suggestions: candidate.treatment_suggestions.clone(),
        red_flags: candidate.red_flags.clone(),
        contradicting_factors: candidate.contradicting_factors.clone(),
        evidence_quality,
    }
}

fn advisory_notes(input: &RankingInput<'_>) -> Vec<String> {
    let mut notes: Vec<String> = input.missing_inputs.iter().map(|m| m.to_string()).collect();

    for outcome in input.outcomes.values() {
        match outcome.status {
            SourceStatus::Ok => {}
            SourceStatus::Timeout => notes.push(format!("{} source timed out", outcome.source)),
            SourceStatus::Error => notes.push(format!("{} source unavailable", outcome.source)),
        }
    }

    if input.context.evidence_count() == 0 {
        notes.push("no supporting evidence retrieved".into());
    }
    if input.context.patient_truncated {
        notes.push("patient data truncated to fit the context budget".into());
    }
    notes.extend(input.synthesis.repair_notes.iter().cloned());
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClinicalQuery, Evidence, Severity, Symptom};
    use crate::pipeline::context::{compose, ComposerSettings};

    fn context(level: CompletenessLevel) -> ComposedContext {
        let query = ClinicalQuery::new("cough", vec![Symptom::new("cough", Severity::Mild)]);
        let evidence = vec![
            Evidence::new(SourceKind::Guideline, "guideline:cap-idsa-ats", "CAP", 0.95),
            Evidence::new(SourceKind::Literature, "pmid:1", "trial", 0.9),
            Evidence::new(SourceKind::Vector, "doc:a", "corpus", 0.6),
        ];
        compose(
            &query,
            &evidence,
            level,
            ComposerSettings {
                budget_chars: 12_000,
                min_relevance: 0.3,
            },
        )
    }

    fn candidate(name: &str, raw: f64, refs: &[&str]) -> SynthesizedCandidate {
        SynthesizedCandidate {
            name: name.into(),
            icd10_code: None,
            raw_confidence: raw,
            reasoning: "r".into(),
            supporting_evidence: refs.iter().map(|r| r.to_string()).collect(),
            recommended_tests: vec![],
            treatment_suggestions: vec![],
            red_flags: vec![],
            contradicting_factors: vec![],
        }
    }

    fn synthesis(candidates: Vec<SynthesizedCandidate>) -> Synthesis {
        Synthesis {
            candidates,
            clinical_reasoning: String::new(),
            missing_information: vec![],
            follow_up: vec![],
            repair_notes: vec![],
            attempts: 1,
        }
    }

    fn outcome(source: SourceKind, status: SourceStatus) -> RetrievalOutcome {
        RetrievalOutcome {
            source,
            status,
            evidence_ids: vec![],
            elapsed_ms: 1,
            error: None,
        }
    }

    fn all_ok() -> BTreeMap<SourceKind, RetrievalOutcome> {
        SourceKind::ALL
            .iter()
            .map(|k| (*k, outcome(*k, SourceStatus::Ok)))
            .collect()
    }

    #[test]
    fn unsupported_candidates_capped() {
        let c = normalized_confidence(0.99, &[], 1.0, &WeightSnapshot::neutral(), CompletenessLevel::Full);
        assert_eq!(c, UNSUPPORTED_CONFIDENCE_CEILING);
    }

    #[test]
    fn completeness_ceiling_applies() {
        let cited = [SourceKind::Guideline, SourceKind::Literature, SourceKind::Literature];
        let snapshot = WeightSnapshot::neutral();
        let minimal = normalized_confidence(1.0, &cited, 1.0, &snapshot, CompletenessLevel::Minimal);
        let partial = normalized_confidence(1.0, &cited, 1.0, &snapshot, CompletenessLevel::Partial);
        let full = normalized_confidence(1.0, &cited, 1.0, &snapshot, CompletenessLevel::Full);
        assert_eq!(minimal, 0.85);
        assert_eq!(partial, 0.95);
        assert_eq!(full, 1.0);
    }

    #[test]
    fn more_support_and_sources_raise_confidence() {
        let snapshot = WeightSnapshot::neutral();
        let level = CompletenessLevel::Full;
        let one = normalized_confidence(0.6, &[SourceKind::Literature], 1.0, &snapshot, level);
        let two = normalized_confidence(
            0.6,
            &[SourceKind::Literature, SourceKind::Guideline],
            1.0,
            &snapshot,
            level,
        );
        assert!(two > one);

        let degraded = normalized_confidence(0.6, &[SourceKind::Literature], 2.0 / 3.0, &snapshot, level);
        assert!(degraded < one);
    }

    #[test]
    fn low_source_weight_lowers_confidence() {
        let mut snapshot = WeightSnapshot::neutral();
        snapshot.weights.insert(SourceKind::Vector, 0.25);
        let level = CompletenessLevel::Full;
        let neutral = normalized_confidence(0.6, &[SourceKind::Vector], 1.0, &WeightSnapshot::neutral(), level);
        let demoted = normalized_confidence(0.6, &[SourceKind::Vector], 1.0, &snapshot, level);
        assert!(demoted < neutral);
    }

    #[test]
    fn ranking_orders_by_confidence_and_keeps_model_order_on_ties() {
        let ctx = context(CompletenessLevel::Full);
        let synth = synthesis(vec![
            candidate("A", 0.3, &["pmid:1"]),
            candidate("B", 0.5, &["pmid:1"]),
            candidate("C", 0.3, &["pmid:1"]),
        ]);
        let outcomes = all_ok();
        let weights = WeightSnapshot::neutral();
        let result = rank(
            RankingInput {
                synthesis: &synth,
                context: &ctx,
                outcomes: &outcomes,
                completeness: CompletenessLevel::Full,
                weights: &weights,
                missing_inputs: &[],
            },
            Uuid::new_v4(),
        );
        let names: Vec<_> = result.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert!(result.advisory_notes.is_empty());
    }

    #[test]
    fn ranking_is_idempotent() {
        let ctx = context(CompletenessLevel::Partial);
        let synth = synthesis(vec![
            candidate("Pneumonia", 0.8, &["pmid:1", "guideline:cap-idsa-ats"]),
            candidate("Bronchitis", 0.5, &[]),
        ]);
        let outcomes = all_ok();
        let weights = WeightSnapshot::neutral();
        let input = RankingInput {
            synthesis: &synth,
            context: &ctx,
            outcomes: &outcomes,
            completeness: CompletenessLevel::Partial,
            weights: &weights,
            missing_inputs: &["medical history not supplied"],
        };
        let id = Uuid::new_v4();
        let first = rank(input, id);
        let second = rank(input, id);
        assert_eq!(first.candidates, second.candidates);
        assert_eq!(first.advisory_notes, second.advisory_notes);
        assert_eq!(first.candidates[0].evidence_quality, EvidenceQuality::High);
        assert_eq!(first.candidates[1].evidence_quality, EvidenceQuality::Low);
        assert_ne!(first.candidates[0].id, first.candidates[1].id);
    }

    #[test]
    fn notes_report_degraded_sources_and_missing_inputs() {
        let query = ClinicalQuery::new("cough", vec![Symptom::new("cough", Severity::Mild)]);
        let empty = compose(
            &query,
            &[],
            CompletenessLevel::Minimal,
            ComposerSettings {
                budget_chars: 12_000,
                min_relevance: 0.3,
            },
        );
        let synth = synthesis(vec![candidate("Viral URI", 0.9, &[])]);
        let mut outcomes = all_ok();
        outcomes.insert(SourceKind::Literature, outcome(SourceKind::Literature, SourceStatus::Timeout));
        let weights = WeightSnapshot::neutral();
        let result = rank(
            RankingInput {
                synthesis: &synth,
                context: &empty,
                outcomes: &outcomes,
                completeness: CompletenessLevel::Minimal,
                weights: &weights,
                missing_inputs: &["vital signs not supplied"],
            },
            Uuid::new_v4(),
        );
        assert!(result.advisory_notes.contains(&"vital signs not supplied".to_string()));
        assert!(result.advisory_notes.contains(&"literature source timed out".to_string()));
        assert!(result.advisory_notes.contains(&"no supporting evidence retrieved".to_string()));
        assert!(result.candidates[0].confidence <= UNSUPPORTED_CONFIDENCE_CEILING);
        assert_eq!(result.confidence_level, ConfidenceLevel::Moderate);
    }

    #[test]
    fn confidence_level_thresholds() {
        assert_eq!(confidence_level(Some(0.7)), ConfidenceLevel::High);
        assert_eq!(confidence_level(Some(0.4)), ConfidenceLevel::Moderate);
        assert_eq!(confidence_level(Some(0.39)), ConfidenceLevel::Low);
        assert_eq!(confidence_level(None), ConfidenceLevel::Low);
    }
}
