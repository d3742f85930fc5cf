pub mod ollama;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod types;
pub mod validation;

pub use ollama::*;
pub use orchestrator::*;
pub use parser::*;
pub use prompt::*;
pub use types::*;
pub use validation::*;

use thiserror::Error;

/// Transport-level failure of the reasoning provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Reasoning provider is not running at {0}")]
    Connection(String),

    #[error("Reasoning provider returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    /// Every attempt failed validation or transport. No partial result.
    #[error("Diagnosis could not be generated after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },
}
