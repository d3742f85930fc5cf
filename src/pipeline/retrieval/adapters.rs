use std::sync::Arc;

use super::types::{GuidelineBackend, LiteratureBackend, SearchRequest, VectorBackend};
use super::RetrievalError;
use crate::models::{Evidence, SourceKind};

/// The closed set of evidence sources, each wrapping a swappable backend.
#[derive(Clone)]
pub enum EvidenceAdapter {
    Literature(Arc<dyn LiteratureBackend>),
    Vector(Arc<dyn VectorBackend>),
    Guideline(Arc<dyn GuidelineBackend>),
}

impl EvidenceAdapter {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Literature(_) => SourceKind::Literature,
            Self::Vector(_) => SourceKind::Vector,
            Self::Guideline(_) => SourceKind::Guideline,
        }
    }

    /// Dispatch one search to the wrapped backend with the inputs it takes.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Evidence>, RetrievalError> {
        match self {
            Self::Literature(backend) => backend.search(&request.text, request.max_results).await,
            Self::Vector(backend) => backend.search(&request.text, request.top_k).await,
            Self::Guideline(backend) => backend.search(&request.condition_keywords).await,
        }
    }
}

impl std::fmt::Debug for EvidenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EvidenceAdapter").field(&self.kind()).finish()
    }
}
