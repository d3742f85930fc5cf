use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::RetrievalError;
use crate::models::Evidence;

/// Per-request search inputs, derived once from the clinical query.
///
/// Carries patient text. Never log it.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub text: String,
    pub condition_keywords: Vec<String>,
    pub max_results: usize,
    pub top_k: usize,
}

/// Literature search backend: `search(text, max_results)`.
pub trait LiteratureBackend: Send + Sync {
    fn search<'a>(
        &'a self,
        text: &'a str,
        max_results: usize,
    ) -> BoxFuture<'a, Result<Vec<Evidence>, RetrievalError>>;
}

/// Semantic search backend: `search(embedding_query, k)`.
pub trait VectorBackend: Send + Sync {
    fn search<'a>(
        &'a self,
        embedding_query: &'a str,
        k: usize,
    ) -> BoxFuture<'a, Result<Vec<Evidence>, RetrievalError>>;

    /// Store literature hits so later semantic searches can find them.
    /// Returns how many were new. Read-only backends keep nothing.
    fn index<'a>(&'a self, evidence: &'a [Evidence]) -> BoxFuture<'a, Result<usize, RetrievalError>> {
        let _ = evidence;
        async { Ok(0) }.boxed()
    }
}

/// Guideline lookup backend: `search(condition_keywords)`.
pub trait GuidelineBackend: Send + Sync {
    fn search<'a>(
        &'a self,
        condition_keywords: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Evidence>, RetrievalError>>;
}

/// Embedding model abstraction
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
    fn dimension(&self) -> usize;
}
