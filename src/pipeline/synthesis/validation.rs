//! Validation of untrusted reasoning output.
//!
//! The provider's JSON is walked field by field instead of being
//! deserialised into trusted types. Every problem in the retained
//! candidates is collected so a single corrective retry can address all of
//! them. Two problems are repaired in place rather than rejected: an
//! over-long candidate list and an unmappable ICD-10 code.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::SynthesizedCandidate;
use crate::pipeline::context::ComposedContext;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("output is not valid JSON: {0}")]
    NotJson(String),

    #[error("missing required field '{path}'")]
    MissingField { path: String },

    #[error("field '{path}' must be {expected}")]
    WrongType { path: String, expected: &'static str },

    #[error("differential_diagnoses[{index}].confidence is not a finite number")]
    NonFiniteConfidence { index: usize },

    #[error("differential_diagnoses is empty")]
    NoCandidates,

    #[error("differential_diagnoses[{index}] cites '{id}', which is not in the provided evidence")]
    UnknownEvidence { index: usize, id: String },
}

/// Output that passed validation, with any repairs noted.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOutput {
    pub candidates: Vec<SynthesizedCandidate>,
    pub clinical_reasoning: String,
    pub missing_information: Vec<String>,
    pub follow_up: Vec<String>,
    pub repair_notes: Vec<String>,
}

static ICD10_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-TV-Z][0-9][0-9AB](?:\.[0-9A-TV-Z]{1,4})?$").ok());

/// Normalise an ICD-10 code, or `None` when it does not look like one.
pub fn normalize_icd10(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    let pattern = ICD10_PATTERN.as_ref()?;
    pattern.is_match(&code).then_some(code)
}

pub fn validate_output(
    value: &Value,
    context: &ComposedContext,
    max_candidates: usize,
) -> Result<ValidatedOutput, Vec<SchemaViolation>> {
    let Some(root) = value.as_object() else {
        return Err(vec![SchemaViolation::WrongType {
            path: "$".into(),
            expected: "object",
        }]);
    };

    let mut violations = Vec::new();
    let mut repair_notes = Vec::new();

    let items = match root.get("differential_diagnoses") {
        None | Some(Value::Null) => {
            return Err(vec![SchemaViolation::MissingField {
                path: "differential_diagnoses".into(),
            }])
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(vec![SchemaViolation::WrongType {
                path: "differential_diagnoses".into(),
                expected: "an array",
            }])
        }
    };

    if items.is_empty() {
        return Err(vec![SchemaViolation::NoCandidates]);
    }

    let kept = select_candidates(items, max_candidates);
    if kept.len() < items.len() {
        repair_notes.push(format!(
            "{} candidates returned; kept the {} with the highest confidence",
            items.len(),
            kept.len()
        ));
    }

    let mut candidates = Vec::with_capacity(kept.len());
    for index in kept {
        match validate_candidate(index, &items[index], context, &mut repair_notes) {
            Ok(candidate) => candidates.push(candidate),
            Err(mut problems) => violations.append(&mut problems),
        }
    }

    let clinical_reasoning = match root.get("clinical_reasoning") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => {
            violations.push(SchemaViolation::WrongType {
                path: "clinical_reasoning".into(),
                expected: "a string",
            });
            String::new()
        }
    };
    let missing_information =
        string_list(root, "missing_information", "missing_information", &mut violations);
    // Older prompts asked for a single follow-up string.
    let follow_up = match root.get("follow_up_instructions") {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => string_list(root, "follow_up_instructions", "follow_up_instructions", &mut violations),
    };

    if violations.is_empty() {
        Ok(ValidatedOutput {
            candidates,
            clinical_reasoning,
            missing_information,
            follow_up,
            repair_notes,
        })
    } else {
        Err(violations)
    }
}

/// Indices of the candidates to keep, in model order. Over the cap, the
/// highest raw confidences win and equal confidences keep model order.
fn select_candidates(items: &[Value], max_candidates: usize) -> Vec<usize> {
    if items.len() <= max_candidates {
        return (0..items.len()).collect();
    }

    let mut order: Vec<(usize, f64)> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let confidence = item
                .get("confidence")
                .and_then(Value::as_f64)
                .filter(|c| c.is_finite())
                .unwrap_or(f64::NEG_INFINITY);
            (i, confidence)
        })
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut kept: Vec<usize> = order
        .into_iter()
        .take(max_candidates)
        .map(|(i, _)| i)
        .collect();
    kept.sort_unstable();
    kept
}

fn validate_candidate(
    index: usize,
    item: &Value,
    context: &ComposedContext,
    repair_notes: &mut Vec<String>,
) -> Result<SynthesizedCandidate, Vec<SchemaViolation>> {
    let path = |field: &str| format!("differential_diagnoses[{index}].{field}");
    let Some(obj) = item.as_object() else {
        return Err(vec![SchemaViolation::WrongType {
            path: format!("differential_diagnoses[{index}]"),
            expected: "an object",
        }]);
    };

    let mut violations = Vec::new();

    let name = required_string(obj, "diagnosis", &path("diagnosis"), &mut violations);
    let reasoning = required_string(obj, "reasoning", &path("reasoning"), &mut violations);

    let raw_confidence = match obj.get("confidence") {
        None | Some(Value::Null) => {
            violations.push(SchemaViolation::MissingField {
                path: path("confidence"),
            });
            0.0
        }
        Some(Value::Number(n)) => match n.as_f64().filter(|c| c.is_finite()) {
            Some(c) => c.clamp(0.0, 1.0),
            None => {
                violations.push(SchemaViolation::NonFiniteConfidence { index });
                0.0
            }
        },
        Some(_) => {
            violations.push(SchemaViolation::WrongType {
                path: path("confidence"),
                expected: "a number",
            });
            0.0
        }
    };

    let icd10_code = match obj.get("icd10_code") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) if raw.trim().is_empty() => None,
        Some(Value::String(raw)) => {
            let code = normalize_icd10(raw);
            if code.is_none() {
                repair_notes.push(format!(
                    "candidate {index}: unmappable ICD-10 code dropped"
                ));
            }
            code
        }
        Some(_) => {
            violations.push(SchemaViolation::WrongType {
                path: path("icd10_code"),
                expected: "a string or null",
            });
            None
        }
    };

    let supporting_evidence =
        string_list(obj, "supporting_evidence", &path("supporting_evidence"), &mut violations);
    for id in &supporting_evidence {
        if !context.contains_evidence(id) {
            violations.push(SchemaViolation::UnknownEvidence {
                index,
                id: id.clone(),
            });
        }
    }
    let mut cited: Vec<String> = Vec::with_capacity(supporting_evidence.len());
    for id in supporting_evidence {
        if !cited.contains(&id) {
            cited.push(id);
        }
    }

    let recommended_tests =
        string_list(obj, "recommended_tests", &path("recommended_tests"), &mut violations);
    let treatment_suggestions = string_list(
        obj,
        "treatment_suggestions",
        &path("treatment_suggestions"),
        &mut violations,
    );
    let red_flags = string_list(obj, "red_flags", &path("red_flags"), &mut violations);
    let contradicting_factors = string_list(
        obj,
        "contradicting_factors",
        &path("contradicting_factors"),
        &mut violations,
    );

    if !violations.is_empty() {
        return Err(violations);
    }

    Ok(SynthesizedCandidate {
        name,
        icd10_code,
        raw_confidence,
        reasoning,
        supporting_evidence: cited,
        recommended_tests,
        treatment_suggestions,
        red_flags,
        contradicting_factors,
    })
}

fn required_string(
    obj: &Map<String, Value>,
    field: &str,
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) -> String {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            violations.push(SchemaViolation::MissingField { path: path.into() });
            String::new()
        }
        Some(_) => {
            violations.push(SchemaViolation::WrongType {
                path: path.into(),
                expected: "a string",
            });
            String::new()
        }
    }
}

/// Optional list of strings. Absent or null is empty; blank entries are
/// skipped; any other shape is a type violation.
fn string_list(
    obj: &Map<String, Value>,
    field: &str,
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) -> Vec<String> {
    match obj.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
                    Value::String(_) => {}
                    _ => {
                        violations.push(SchemaViolation::WrongType {
                            path: path.into(),
                            expected: "an array of strings",
                        });
                        return Vec::new();
                    }
                }
            }
            out
        }
        Some(_) => {
            violations.push(SchemaViolation::WrongType {
                path: path.into(),
                expected: "an array of strings",
            });
            Vec::new()
        }
    }
}
