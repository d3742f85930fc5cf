pub mod adapters;
pub mod coordinator;
pub mod guideline;
pub mod literature;
pub mod query;
pub mod types;
pub mod vector;

pub use adapters::*;
pub use coordinator::*;
pub use guideline::*;
pub use literature::*;
pub use query::*;
pub use types::*;
pub use vector::*;

use thiserror::Error;

/// Failure of a single evidence source. Never escapes the coordinator.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Only the status is kept; upstream bodies may echo patient text.
    #[error("Upstream returned error (status {status})")]
    Upstream { status: u16 },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
