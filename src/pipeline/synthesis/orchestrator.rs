use std::sync::Arc;

use super::parser::parse_response;
use super::prompt::{build_prompt, corrective_prompt, output_schema};
use super::types::{ReasoningProvider, Synthesis};
use super::validation::{validate_output, SchemaViolation};
use super::SynthesisError;
use crate::pipeline::context::ComposedContext;

/// Turns a composed context into validated candidates:
/// prompt → provider → parse → validate, retrying on failure.
pub struct DiagnosisSynthesizer {
    provider: Arc<dyn ReasoningProvider>,
    max_retries: u32,
    max_candidates: usize,
}

impl DiagnosisSynthesizer {
    pub fn new(provider: Arc<dyn ReasoningProvider>, max_retries: u32, max_candidates: usize) -> Self {
        Self {
            provider,
            max_retries,
            max_candidates: max_candidates.max(1),
        }
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// At most `max_retries + 1` provider calls. A schema failure retries
    /// with the violations appended to the prompt; a transport failure
    /// retries the same prompt. Nothing partial is returned on exhaustion.
    pub async fn synthesize(&self, context: &ComposedContext) -> Result<Synthesis, SynthesisError> {
        let schema = output_schema(self.max_candidates);
        let base = build_prompt(context, self.max_candidates);
        let mut prompt = base.clone();
        let mut last_reason = String::new();

        for attempt in 0..=self.max_retries {
            let response = match self.provider.complete(&prompt, &schema).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "Reasoning provider call failed");
                    last_reason = e.to_string();
                    continue;
                }
            };

            let violations = match parse_response(&response) {
                Ok(value) => match validate_output(&value, context, self.max_candidates) {
                    Ok(output) => {
                        if !output.repair_notes.is_empty() {
                            tracing::info!(
                                attempt = attempt + 1,
                                repairs = output.repair_notes.len(),
                                "Synthesis output repaired"
                            );
                        }
                        return Ok(Synthesis {
                            candidates: output.candidates,
                            clinical_reasoning: output.clinical_reasoning,
                            missing_information: output.missing_information,
                            follow_up: output.follow_up,
                            repair_notes: output.repair_notes,
                            attempts: attempt + 1,
                        });
                    }
                    Err(violations) => violations,
                },
                Err(violation) => vec![violation],
            };

            tracing::warn!(
                attempt = attempt + 1,
                violations = violations.len(),
                first = %violations[0],
                "Synthesis output rejected"
            );
            last_reason = summarize(&violations);
            prompt = corrective_prompt(&base, &violations);
        }

        Err(SynthesisError::Exhausted {
            attempts: self.max_retries + 1,
            reason: last_reason,
        })
    }
}

fn summarize(violations: &[SchemaViolation]) -> String {
    match violations {
        [] => "invalid output".into(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}
