use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{Severity, Sex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub name: String,
    pub severity: Severity,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Symptom {
    pub fn new(name: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            severity,
            duration: None,
            notes: None,
        }
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }
}

/// Structured lab value. OCR output arrives already in this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub value: f64,
    pub unit: String,
    #[serde(default)]
    pub reference_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorDiagnosis {
    pub condition: String,
    #[serde(default)]
    pub diagnosed_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientHistory {
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub prior_diagnoses: Vec<PriorDiagnosis>,
}

impl PatientHistory {
    pub fn is_empty(&self) -> bool {
        self.chronic_conditions.is_empty()
            && self.allergies.is_empty()
            && self.current_medications.is_empty()
            && self.prior_diagnoses.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    #[serde(default)]
    pub age_years: Option<u32>,
    #[serde(default)]
    pub sex: Option<Sex>,
}

/// Everything the clinician supplied for one differential request.
///
/// Only the chief complaint and symptoms are required. Maps are ordered so
/// that prompt rendering and fingerprints are deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalQuery {
    pub chief_complaint: String,
    pub symptoms: Vec<Symptom>,
    #[serde(default)]
    pub vitals: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub labs: Option<BTreeMap<String, LabResult>>,
    #[serde(default)]
    pub history: Option<PatientHistory>,
    #[serde(default)]
    pub demographics: Option<Demographics>,
}

impl ClinicalQuery {
    pub fn new(chief_complaint: impl Into<String>, symptoms: Vec<Symptom>) -> Self {
        Self {
            chief_complaint: chief_complaint.into(),
            symptoms,
            vitals: None,
            labs: None,
            history: None,
            demographics: None,
        }
    }

    pub fn with_vitals<I, K>(mut self, vitals: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.vitals = Some(vitals.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    pub fn with_labs<I, K>(mut self, labs: I) -> Self
    where
        I: IntoIterator<Item = (K, LabResult)>,
        K: Into<String>,
    {
        self.labs = Some(labs.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    pub fn with_history(mut self, history: PatientHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_demographics(mut self, age_years: Option<u32>, sex: Option<Sex>) -> Self {
        self.demographics = Some(Demographics { age_years, sex });
        self
    }

    pub fn has_vitals(&self) -> bool {
        self.vitals.as_ref().is_some_and(|v| !v.is_empty())
    }

    pub fn has_labs(&self) -> bool {
        self.labs.as_ref().is_some_and(|l| !l.is_empty())
    }

    pub fn has_history(&self) -> bool {
        self.history.as_ref().is_some_and(|h| !h.is_empty())
    }
}
