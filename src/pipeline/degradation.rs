//! Input completeness classification and fast-fail validation.
//!
//! `validate` runs before any retrieval so a rejected query never costs an
//! adapter call. `classify` decides how much patient signal the request
//! carries, which later drives context emphasis and confidence ceilings.

use thiserror::Error;

use crate::models::{ClinicalQuery, CompletenessLevel};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Chief complaint is required")]
    EmptyComplaint,

    #[error("At least one symptom is required")]
    NoSymptoms,

    #[error("Symptom #{index} has a blank name")]
    BlankSymptomName { index: usize },

    #[error("Vital sign '{name}' is not a finite number")]
    NonFiniteVital { name: String },

    #[error("Vital sign '{name}' = {value} is outside the plausible range {min}..={max}")]
    ImplausibleVital {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Lab result '{name}' is not a finite number")]
    NonFiniteLab { name: String },

    #[error("Age {0} is not plausible")]
    ImplausibleAge(u32),
}

/// Physiological bounds for the vitals we recognise. Unknown vital names are
/// accepted as long as they are finite.
struct VitalRange {
    aliases: &'static [&'static str],
    min: f64,
    max: f64,
}

const VITAL_RANGES: &[VitalRange] = &[
    VitalRange {
        aliases: &["temperature", "temp", "temperature_c", "body_temperature"],
        min: 30.0,
        max: 45.0,
    },
    VitalRange {
        aliases: &["heart_rate", "hr", "pulse"],
        min: 20.0,
        max: 250.0,
    },
    VitalRange {
        aliases: &["respiratory_rate", "rr", "resp_rate"],
        min: 4.0,
        max: 60.0,
    },
    VitalRange {
        aliases: &["spo2", "oxygen_saturation", "o2_sat", "sao2"],
        min: 50.0,
        max: 100.0,
    },
    VitalRange {
        aliases: &["systolic_bp", "systolic", "bp_systolic", "blood_pressure_systolic"],
        min: 50.0,
        max: 260.0,
    },
    VitalRange {
        aliases: &["diastolic_bp", "diastolic", "bp_diastolic", "blood_pressure_diastolic"],
        min: 30.0,
        max: 160.0,
    },
];

const MAX_PLAUSIBLE_AGE: u32 = 130;

fn normalize_vital_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

fn vital_range(name: &str) -> Option<&'static VitalRange> {
    let normalized = normalize_vital_name(name);
    VITAL_RANGES
        .iter()
        .find(|r| r.aliases.contains(&normalized.as_str()))
}

/// Reject queries that cannot produce a meaningful differential.
pub fn validate(query: &ClinicalQuery) -> Result<(), ValidationError> {
    if query.chief_complaint.trim().is_empty() {
        return Err(ValidationError::EmptyComplaint);
    }
    if query.symptoms.is_empty() {
        return Err(ValidationError::NoSymptoms);
    }
    if let Some(index) = query.symptoms.iter().position(|s| s.name.trim().is_empty()) {
        return Err(ValidationError::BlankSymptomName { index });
    }

    if let Some(vitals) = &query.vitals {
        for (name, &value) in vitals {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteVital { name: name.clone() });
            }
            if let Some(range) = vital_range(name) {
                if value < range.min || value > range.max {
                    return Err(ValidationError::ImplausibleVital {
                        name: name.clone(),
                        value,
                        min: range.min,
                        max: range.max,
                    });
                }
            }
        }
    }

    if let Some(labs) = &query.labs {
        if let Some((name, _)) = labs.iter().find(|(_, lab)| !lab.value.is_finite()) {
            return Err(ValidationError::NonFiniteLab { name: name.clone() });
        }
    }

    if let Some(age) = query.demographics.as_ref().and_then(|d| d.age_years) {
        if age > MAX_PLAUSIBLE_AGE {
            return Err(ValidationError::ImplausibleAge(age));
        }
    }

    Ok(())
}

/// How much optional patient data accompanies the complaint.
///
/// History on its own does not lift a query above `Minimal`.
pub fn classify(query: &ClinicalQuery) -> CompletenessLevel {
    let vitals = query.has_vitals();
    let labs = query.has_labs();
    let history = query.has_history();

    match (vitals, labs, history) {
        (true, true, true) => CompletenessLevel::Full,
        (true, _, _) | (_, true, _) => CompletenessLevel::Partial,
        _ => CompletenessLevel::Minimal,
    }
}

/// Human-readable gaps used for advisory notes and missing-information lists.
pub fn missing_inputs(query: &ClinicalQuery) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !query.has_vitals() {
        missing.push("vital signs not supplied");
    }
    if !query.has_labs() {
        missing.push("laboratory results not supplied");
    }
    if !query.has_history() {
        missing.push("medical history not supplied");
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabResult, PatientHistory, Severity, Symptom};

    fn base() -> ClinicalQuery {
        ClinicalQuery::new("cough", vec![Symptom::new("cough", Severity::Moderate)])
    }

    fn history() -> PatientHistory {
        PatientHistory {
            chronic_conditions: vec!["asthma".into()],
            ..Default::default()
        }
    }

    fn lab() -> LabResult {
        LabResult {
            value: 12.4,
            unit: "10^9/L".into(),
            reference_range: Some("4.0-11.0".into()),
        }
    }

    #[test]
    fn empty_complaint_rejected() {
        let query = ClinicalQuery::new("   ", vec![Symptom::new("cough", Severity::Mild)]);
        assert_eq!(validate(&query), Err(ValidationError::EmptyComplaint));
    }

    #[test]
    fn empty_symptoms_rejected() {
        let query = ClinicalQuery::new("cough", vec![]);
        assert_eq!(validate(&query), Err(ValidationError::NoSymptoms));
    }

    #[test]
    fn blank_symptom_name_rejected() {
        let query = ClinicalQuery::new(
            "cough",
            vec![Symptom::new("cough", Severity::Mild), Symptom::new(" ", Severity::Mild)],
        );
        assert_eq!(validate(&query), Err(ValidationError::BlankSymptomName { index: 1 }));
    }

    #[test]
    fn implausible_temperature_rejected() {
        let query = base().with_vitals([("Temperature", 52.0)]);
        assert!(matches!(
            validate(&query),
            Err(ValidationError::ImplausibleVital { .. })
        ));
    }

    #[test]
    fn non_finite_vital_rejected() {
        let query = base().with_vitals([("heart_rate", f64::NAN)]);
        assert_eq!(
            validate(&query),
            Err(ValidationError::NonFiniteVital { name: "heart_rate".into() })
        );
    }

    #[test]
    fn unknown_vital_accepted_when_finite() {
        let query = base().with_vitals([("peak_flow", 420.0), ("spo2", 94.0)]);
        assert_eq!(validate(&query), Ok(()));
    }

    #[test]
    fn implausible_age_rejected() {
        let query = base().with_demographics(Some(150), None);
        assert_eq!(validate(&query), Err(ValidationError::ImplausibleAge(150)));
    }

    #[test]
    fn complaint_and_symptoms_only_is_minimal() {
        assert_eq!(classify(&base()), CompletenessLevel::Minimal);
    }

    #[test]
    fn history_alone_stays_minimal() {
        assert_eq!(classify(&base().with_history(history())), CompletenessLevel::Minimal);
    }

    #[test]
    fn vitals_or_labs_is_partial() {
        assert_eq!(
            classify(&base().with_vitals([("temperature", 38.4)])),
            CompletenessLevel::Partial
        );
        assert_eq!(
            classify(&base().with_labs([("wbc", lab())])),
            CompletenessLevel::Partial
        );
        assert_eq!(
            classify(&base().with_vitals([("temperature", 38.4)]).with_labs([("wbc", lab())])),
            CompletenessLevel::Partial
        );
    }

    #[test]
    fn vitals_labs_and_history_is_full() {
        let query = base()
            .with_vitals([("temperature", 38.4)])
            .with_labs([("wbc", lab())])
            .with_history(history());
        assert_eq!(classify(&query), CompletenessLevel::Full);
    }

    #[test]
    fn missing_inputs_lists_gaps() {
        let missing = missing_inputs(&base().with_vitals([("temperature", 37.0)]));
        assert!(!missing.contains(&"vital signs not supplied"));
        assert!(missing.contains(&"laboratory results not supplied"));
        assert!(missing.contains(&"medical history not supplied"));
    }
}
