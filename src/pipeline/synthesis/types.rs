use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::ProviderError;

/// System and user messages for one provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredPrompt {
    pub system: String,
    pub user: String,
}

/// Generative reasoning provider: `complete(prompt, schema) -> text`.
///
/// Output is untrusted and always goes through schema validation.
pub trait ReasoningProvider: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: &'a StructuredPrompt,
        schema: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;
}

/// A validated, not yet ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedCandidate {
    pub name: String,
    pub icd10_code: Option<String>,
    /// Clamped to [0, 1].
    pub raw_confidence: f64,
    pub reasoning: String,
    pub supporting_evidence: Vec<String>,
    pub recommended_tests: Vec<String>,
    pub treatment_suggestions: Vec<String>,
    pub red_flags: Vec<String>,
    pub contradicting_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub candidates: Vec<SynthesizedCandidate>,
    pub clinical_reasoning: String,
    pub missing_information: Vec<String>,
    pub follow_up: Vec<String>,
    /// Repairs applied to the accepted output (e.g. truncation).
    pub repair_notes: Vec<String>,
    pub attempts: u32,
}
