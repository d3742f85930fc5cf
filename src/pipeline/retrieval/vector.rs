//! In-memory semantic index over an embedded evidence corpus.

use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::literature::pubmed_evidence_id;
use super::types::{EmbeddingModel, VectorBackend};
use super::RetrievalError;
use crate::models::{Evidence, EvidenceMetadata, SourceKind};

/// Default dimension for the hashing embedder.
pub const EMBEDDING_DIM: usize = 384;

// ═══════════════════════════════════════════════════════════
// Embedding
// ═══════════════════════════════════════════════════════════

/// Feature-hashing bag-of-words embedder.
///
/// Each lowercased token is hashed into a signed bucket, then the vector is
/// L2-normalised. Texts sharing vocabulary land close under cosine.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vec = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }

        // L2 normalize
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut vec {
                *val /= norm;
            }
        }
        Ok(vec)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

// ═══════════════════════════════════════════════════════════
// Corpus
// ═══════════════════════════════════════════════════════════

/// One corpus record as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub pubmed_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub url: Option<String>,
    /// Precomputed embedding. Computed at load when absent.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

struct IndexedDocument {
    evidence_id: String,
    text: String,
    metadata: EvidenceMetadata,
    embedding: Vec<f32>,
}

/// Cosine-similarity index.
///
/// Loaded from the corpus at startup and grown at runtime with literature
/// hits. Entries are never removed; an id is stored at most once.
pub struct VectorIndex {
    embedder: Arc<dyn EmbeddingModel>,
    entries: RwLock<Vec<IndexedDocument>>,
    min_similarity: f32,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn EmbeddingModel>, min_similarity: f32) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
            min_similarity,
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, Vec<IndexedDocument>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, Vec<IndexedDocument>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    pub fn contains(&self, evidence_id: &str) -> bool {
        self.read_entries().iter().any(|e| e.evidence_id == evidence_id)
    }

    /// Add one document. PubMed-backed documents share the literature id so
    /// the coordinator can collapse duplicates across sources.
    ///
    /// Returns `false` when the id is already indexed.
    pub fn add(&self, doc: CorpusDocument) -> Result<bool, RetrievalError> {
        let evidence_id = match (&doc.pubmed_id, &doc.id) {
            (Some(pmid), _) => pubmed_evidence_id(pmid),
            (None, Some(id)) => format!("doc:{id}"),
            (None, None) => {
                return Err(RetrievalError::Corpus(
                    "document needs an id or pubmed_id".into(),
                ))
            }
        };

        let embedding = match doc.embedding {
            Some(e) if e.len() == self.embedder.dimension() => e,
            Some(e) => {
                return Err(RetrievalError::Corpus(format!(
                    "{evidence_id}: embedding has {} dimensions, expected {}",
                    e.len(),
                    self.embedder.dimension()
                )))
            }
            None => self.embedder.embed(&doc.text)?,
        };

        Ok(self.insert(IndexedDocument {
            evidence_id,
            metadata: EvidenceMetadata {
                title: doc.title,
                publication_year: doc.publication_year,
                journal: doc.journal,
                url: doc.url,
                ..Default::default()
            },
            text: doc.text,
            embedding,
        }))
    }

    /// Index literature evidence under its own id. Items already present
    /// are skipped. Returns how many were added.
    pub fn add_evidence(&self, evidence: &[Evidence]) -> Result<usize, RetrievalError> {
        let mut added = 0;
        for item in evidence {
            if self.contains(&item.id) {
                continue;
            }
            let embed_text = match &item.metadata.title {
                Some(title) => format!("{title} {}", item.snippet),
                None => item.snippet.clone(),
            };
            let embedding = self.embedder.embed(&embed_text)?;
            let inserted = self.insert(IndexedDocument {
                evidence_id: item.id.clone(),
                text: item.snippet.clone(),
                metadata: item.metadata.clone(),
                embedding,
            });
            if inserted {
                added += 1;
            }
        }
        Ok(added)
    }

    fn insert(&self, doc: IndexedDocument) -> bool {
        let mut entries = self.write_entries();
        if entries.iter().any(|e| e.evidence_id == doc.evidence_id) {
            return false;
        }
        entries.push(doc);
        true
    }

    /// Load a JSON array of `CorpusDocument` records.
    pub fn load_json(
        path: &Path,
        embedder: Arc<dyn EmbeddingModel>,
        min_similarity: f32,
    ) -> Result<Self, RetrievalError> {
        let raw = std::fs::read_to_string(path)?;
        let docs: Vec<CorpusDocument> = serde_json::from_str(&raw)
            .map_err(|e| RetrievalError::Corpus(format!("invalid corpus JSON: {e}")))?;

        let index = Self::new(embedder, min_similarity);
        for doc in docs {
            index.add(doc)?;
        }
        tracing::info!(documents = index.len(), "Vector corpus loaded");
        Ok(index)
    }

    /// Top-`k` documents at or above the similarity floor.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<Evidence>, RetrievalError> {
        let query_embedding = self.embedder.embed(text)?;
        let entries = self.read_entries();

        let mut scored: Vec<(f32, usize)> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (cosine_similarity(&query_embedding, &entry.embedding), i))
            .filter(|(score, _)| *score >= self.min_similarity)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, i)| {
                let entry = &entries[i];
                Evidence::new(
                    SourceKind::Vector,
                    entry.evidence_id.clone(),
                    entry.text.clone(),
                    f64::from(score),
                )
                .with_metadata(entry.metadata.clone())
            })
            .collect())
    }
}

impl VectorBackend for VectorIndex {
    fn search<'a>(
        &'a self,
        embedding_query: &'a str,
        k: usize,
    ) -> BoxFuture<'a, Result<Vec<Evidence>, RetrievalError>> {
        async move { self.query(embedding_query, k) }.boxed()
    }

    fn index<'a>(&'a self, evidence: &'a [Evidence]) -> BoxFuture<'a, Result<usize, RetrievalError>> {
        async move { self.add_evidence(evidence) }.boxed()
    }
}
