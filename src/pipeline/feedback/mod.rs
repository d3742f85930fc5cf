pub mod ingestion;
pub mod ledger;
pub mod weights;

pub use ingestion::*;
pub use ledger::*;
pub use weights::*;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedbackError {
    #[error("Unknown diagnosis: {0}")]
    UnknownDiagnosis(Uuid),

    #[error("Invalid feedback: {0}")]
    Invalid(String),
}
