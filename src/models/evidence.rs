use serde::{Deserialize, Serialize};

use super::enums::{SourceKind, SourceStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guideline_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One piece of supporting evidence returned by a source adapter.
///
/// `relevance` is the adapter's own score. `weighted_relevance` is assigned
/// by the retrieval coordinator from the current source weight and is what
/// every downstream ordering uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub source: SourceKind,
    pub snippet: String,
    pub relevance: f64,
    pub weighted_relevance: f64,
    #[serde(default)]
    pub metadata: EvidenceMetadata,
}

impl Evidence {
    pub fn new(
        source: SourceKind,
        id: impl Into<String>,
        snippet: impl Into<String>,
        relevance: f64,
    ) -> Self {
        let relevance = if relevance.is_finite() {
            relevance.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            id: id.into(),
            source,
            snippet: snippet.into(),
            relevance,
            weighted_relevance: relevance,
            metadata: EvidenceMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: EvidenceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// What happened to one source during a retrieval fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub source: SourceKind,
    pub status: SourceStatus,
    /// Ids of the evidence this source contributed. Empty on failure.
    pub evidence_ids: Vec<String>,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetrievalOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == SourceStatus::Ok
    }
}
