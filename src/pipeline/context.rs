//! Size-bounded reasoning context.
//!
//! The patient segment is sized first and always kept. A short guidance
//! segment follows if it fits, then evidence in canonical order until the
//! budget or the per-level segment cap is reached. Composition is a pure
//! function of its inputs.

use serde::Serialize;

use super::retrieval::coordinator::evidence_order;
use super::safety::{sanitize_field, sanitize_text, truncate_at_word_boundary};
use crate::models::{ClinicalQuery, CompletenessLevel, Evidence, SourceKind};
use crate::pipeline::retrieval::query::age_group;

const PATIENT_LABEL: &str = "PATIENT_DATA";
const GUIDANCE_LABEL: &str = "GUIDANCE";
const EVIDENCE_LABEL: &str = "EVIDENCE";
const SEGMENT_SEPARATOR: &str = "\n\n";

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Guidance,
    Patient,
    Evidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSegment {
    pub kind: SegmentKind,
    pub evidence_id: Option<String>,
    pub source: Option<SourceKind>,
    pub weighted_relevance: Option<f64>,
    pub content: String,
}

impl ContextSegment {
    fn label(&self) -> &'static str {
        match self.kind {
            SegmentKind::Guidance => GUIDANCE_LABEL,
            SegmentKind::Patient => PATIENT_LABEL,
            SegmentKind::Evidence => EVIDENCE_LABEL,
        }
    }

    pub fn render(&self) -> String {
        wrap(self.label(), &self.content)
    }

    pub fn size(&self) -> usize {
        self.render().len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedContext {
    /// Guidance (if it fit), patient data, then evidence best first.
    pub segments: Vec<ContextSegment>,
    /// Size of `render()` in bytes. Never exceeds `budget_chars`.
    pub total_chars: usize,
    pub budget_chars: usize,
    pub completeness: CompletenessLevel,
    pub patient_truncated: bool,
    /// Evidence above the relevance floor that did not fit.
    pub dropped_evidence: Vec<String>,
    /// Evidence excluded for falling below the relevance floor.
    pub below_threshold: usize,
}

impl ComposedContext {
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(ContextSegment::render)
            .collect::<Vec<_>>()
            .join(SEGMENT_SEPARATOR)
    }

    pub fn evidence_ids(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .filter_map(|s| s.evidence_id.as_deref())
    }

    pub fn contains_evidence(&self, id: &str) -> bool {
        self.evidence_ids().any(|e| e == id)
    }

    pub fn evidence_source(&self, id: &str) -> Option<SourceKind> {
        self.segments
            .iter()
            .find(|s| s.evidence_id.as_deref() == Some(id))
            .and_then(|s| s.source)
    }

    pub fn evidence_count(&self) -> usize {
        self.evidence_ids().count()
    }
}

/// Composition parameters that vary with completeness. Thin patient signal
/// admits more and longer evidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelProfile {
    pub max_evidence_segments: usize,
    pub snippet_chars: usize,
    pub guidance: &'static str,
}

pub fn level_profile(level: CompletenessLevel) -> LevelProfile {
    match level {
        CompletenessLevel::Minimal => LevelProfile {
            max_evidence_segments: 12,
            snippet_chars: 700,
            guidance: "Patient data is limited to the presenting complaint and symptoms. \
                       The patient signal is thin: lean on the cited evidence, keep confidence \
                       conservative and list the findings that would separate the candidates.",
        },
        CompletenessLevel::Partial => LevelProfile {
            max_evidence_segments: 8,
            snippet_chars: 500,
            guidance: "Some objective data is available. Weigh the vital signs or laboratory \
                       results against the evidence and state what is still missing.",
        },
        CompletenessLevel::Full => LevelProfile {
            max_evidence_segments: 6,
            snippet_chars: 400,
            guidance: "Vital signs, laboratory results and history are available. Anchor the \
                       differential in the objective findings.",
        },
    }
}

// ═══════════════════════════════════════════════════════════
// Composition
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposerSettings {
    pub budget_chars: usize,
    pub min_relevance: f64,
}

pub fn compose(
    query: &ClinicalQuery,
    evidence: &[Evidence],
    completeness: CompletenessLevel,
    settings: ComposerSettings,
) -> ComposedContext {
    let profile = level_profile(completeness);
    let budget = settings.budget_chars;

    // Patient data is never dropped; truncated only if it alone overflows.
    let mut patient_content = format_patient(query);
    let mut patient_truncated = false;
    let overhead = wrap(PATIENT_LABEL, "").len();
    if overhead + patient_content.len() > budget {
        patient_content = truncate_to_bytes(&patient_content, budget.saturating_sub(overhead));
        patient_truncated = true;
    }
    let patient = ContextSegment {
        kind: SegmentKind::Patient,
        evidence_id: None,
        source: None,
        weighted_relevance: None,
        content: patient_content,
    };
    let mut total = patient.size();

    let guidance = ContextSegment {
        kind: SegmentKind::Guidance,
        evidence_id: None,
        source: None,
        weighted_relevance: None,
        content: profile.guidance.to_string(),
    };
    let mut segments = Vec::new();
    let guidance_cost = SEGMENT_SEPARATOR.len() + guidance.size();
    if total + guidance_cost <= budget {
        total += guidance_cost;
        segments.push(guidance);
    }
    segments.push(patient);

    let mut ranked: Vec<&Evidence> = Vec::with_capacity(evidence.len());
    let mut below_threshold = 0;
    for item in evidence {
        if item.weighted_relevance >= settings.min_relevance {
            ranked.push(item);
        } else {
            below_threshold += 1;
        }
    }
    ranked.sort_by(|a, b| evidence_order(a, b));

    let mut dropped_evidence = Vec::new();
    let mut admitted = 0;
    let mut full = false;
    for item in ranked {
        if full || admitted >= profile.max_evidence_segments {
            dropped_evidence.push(item.id.clone());
            continue;
        }
        let segment = ContextSegment {
            kind: SegmentKind::Evidence,
            evidence_id: Some(item.id.clone()),
            source: Some(item.source),
            weighted_relevance: Some(item.weighted_relevance),
            content: format_evidence(item, profile.snippet_chars),
        };
        let cost = SEGMENT_SEPARATOR.len() + segment.size();
        if total + cost <= budget {
            total += cost;
            admitted += 1;
            segments.push(segment);
        } else {
            // Anything after this ranks lower; admitting it would drop
            // higher-relevance evidence first.
            full = true;
            dropped_evidence.push(item.id.clone());
        }
    }

    ComposedContext {
        segments,
        total_chars: total,
        budget_chars: budget,
        completeness,
        patient_truncated,
        dropped_evidence,
        below_threshold,
    }
}

fn wrap(label: &str, content: &str) -> String {
    format!("<{label}>\n{content}\n</{label}>")
}

/// Word-boundary truncation to a byte budget.
fn truncate_to_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let head = &text[..cut];
    match head.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => head[..pos].trim_end().to_string(),
        _ => head.to_string(),
    }
}

fn format_patient(query: &ClinicalQuery) -> String {
    let mut lines = Vec::new();

    if let Some(d) = &query.demographics {
        let mut parts = Vec::new();
        if let Some(age) = d.age_years {
            parts.push(format!("{age} years ({})", age_group(age)));
        }
        if let Some(sex) = d.sex {
            parts.push(sex.as_str().to_string());
        }
        if !parts.is_empty() {
            lines.push(format!("Demographics: {}", parts.join(", ")));
        }
    }

    lines.push(format!("Chief complaint: {}", sanitize_field(&query.chief_complaint)));

    lines.push("Symptoms:".to_string());
    for s in &query.symptoms {
        let mut line = format!("- {} (severity: {}", sanitize_field(&s.name), s.severity.as_str());
        if let Some(duration) = &s.duration {
            line.push_str(&format!(", duration: {}", sanitize_field(duration)));
        }
        line.push(')');
        if let Some(notes) = &s.notes {
            line.push_str(&format!(" - {}", sanitize_field(notes)));
        }
        lines.push(line);
    }

    if let Some(vitals) = query.vitals.as_ref().filter(|v| !v.is_empty()) {
        lines.push("Vital signs:".to_string());
        for (name, value) in vitals {
            lines.push(format!("- {}: {value}", sanitize_field(name)));
        }
    }

    if let Some(labs) = query.labs.as_ref().filter(|l| !l.is_empty()) {
        lines.push("Laboratory results:".to_string());
        for (name, lab) in labs {
            let mut line = format!("- {}: {} {}", sanitize_field(name), lab.value, sanitize_field(&lab.unit));
            if let Some(range) = &lab.reference_range {
                line.push_str(&format!(" (reference {})", sanitize_field(range)));
            }
            lines.push(line);
        }
    }

    if let Some(h) = query.history.as_ref().filter(|h| !h.is_empty()) {
        lines.push("History:".to_string());
        let join = |items: &[String]| {
            items
                .iter()
                .map(|i| sanitize_field(i))
                .collect::<Vec<_>>()
                .join(", ")
        };
        if !h.chronic_conditions.is_empty() {
            lines.push(format!("- Chronic conditions: {}", join(&h.chronic_conditions)));
        }
        if !h.allergies.is_empty() {
            lines.push(format!("- Allergies: {}", join(&h.allergies)));
        }
        if !h.current_medications.is_empty() {
            lines.push(format!("- Current medications: {}", join(&h.current_medications)));
        }
        if !h.prior_diagnoses.is_empty() {
            let prior = h
                .prior_diagnoses
                .iter()
                .map(|p| match p.diagnosed_on {
                    Some(date) => format!("{} ({date})", sanitize_field(&p.condition)),
                    None => sanitize_field(&p.condition),
                })
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("- Prior diagnoses: {prior}"));
        }
    }

    lines.join("\n")
}

fn format_evidence(item: &Evidence, snippet_chars: usize) -> String {
    let mut header = format!(
        "[ID: {}] [Source: {}] [Relevance: {:.2}]",
        item.id,
        item.source.as_str(),
        item.weighted_relevance
    );
    if let Some(year) = item.metadata.publication_year {
        header.push_str(&format!(" [Year: {year}]"));
    }
    if let Some(code) = &item.metadata.guideline_code {
        header.push_str(&format!(" [Guideline: {code}]"));
    }

    let snippet = sanitize_text(&item.snippet, usize::MAX).text;
    let snippet = if snippet.chars().count() > snippet_chars {
        format!("{} ...", truncate_at_word_boundary(&snippet, snippet_chars))
    } else {
        snippet
    };

    format!("{header}\n{snippet}")
}
