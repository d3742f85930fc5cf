//! Concurrent evidence retrieval.
//!
//! One search per adapter, all started together and each bounded by its own
//! timeout. A slow or failing source only produces a non-`ok` outcome; it
//! never cancels or delays the others beyond its own budget. Evidence from
//! the successful sources is weighted, merged and deduplicated.
//!
//! Literature hits from a successful search are handed to the vector
//! backend in a detached task, so later requests can find them
//! semantically without the current response waiting on the write.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::Instrument;

use super::adapters::EvidenceAdapter;
use super::types::{SearchRequest, VectorBackend};
use crate::models::{ClinicalQuery, Evidence, RetrievalOutcome, SourceKind, SourceStatus};
use crate::pipeline::feedback::weights::{SourceWeightState, WeightSnapshot};
use crate::pipeline_config::SourceTimeouts;

/// Result limits passed to the adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub literature_max_results: usize,
    pub vector_top_k: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            literature_max_results: 8,
            vector_top_k: 8,
        }
    }
}

/// Everything one retrieval fan-out produced.
#[derive(Debug, Clone)]
pub struct RetrievalReport {
    /// Merged evidence from every `ok` source, best first.
    pub evidence: Vec<Evidence>,
    pub outcomes: BTreeMap<SourceKind, RetrievalOutcome>,
    /// Weights used for this request, reused by ranking.
    pub weights: WeightSnapshot,
}

impl RetrievalReport {
    /// Fraction of sources that returned `ok`. 0.0 with no sources.
    pub fn ok_fraction(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let ok = self.outcomes.values().filter(|o| o.is_ok()).count();
        ok as f64 / self.outcomes.len() as f64
    }
}

pub struct RetrievalCoordinator {
    adapters: Vec<EvidenceAdapter>,
    timeouts: SourceTimeouts,
    limits: SearchLimits,
    weights: Arc<SourceWeightState>,
    index_literature_hits: bool,
}

impl RetrievalCoordinator {
    /// One adapter per source kind; later duplicates are ignored.
    pub fn new(
        adapters: Vec<EvidenceAdapter>,
        timeouts: SourceTimeouts,
        limits: SearchLimits,
        weights: Arc<SourceWeightState>,
    ) -> Self {
        let mut seen = HashSet::new();
        let adapters = adapters
            .into_iter()
            .filter(|a| {
                let fresh = seen.insert(a.kind());
                if !fresh {
                    tracing::warn!(source = %a.kind(), "Duplicate evidence adapter ignored");
                }
                fresh
            })
            .collect();

        Self {
            adapters,
            timeouts,
            limits,
            weights,
            index_literature_hits: true,
        }
    }

    /// Toggle feeding literature hits into the vector backend. On by default.
    pub fn with_literature_indexing(mut self, enabled: bool) -> Self {
        self.index_literature_hits = enabled;
        self
    }

    pub fn sources(&self) -> Vec<SourceKind> {
        self.adapters.iter().map(EvidenceAdapter::kind).collect()
    }

    /// Fan out to every adapter and merge what comes back in time.
    ///
    /// Never fails: with every source down the report simply holds no
    /// evidence and all-failed outcomes.
    pub async fn retrieve(&self, query: &ClinicalQuery) -> RetrievalReport {
        let weights = self.weights.snapshot();
        let request = SearchRequest::from_query(
            query,
            self.limits.literature_max_results,
            self.limits.vector_top_k,
        );

        let searches = self.adapters.iter().map(|adapter| {
            let kind = adapter.kind();
            let budget = self.timeouts.for_source(kind);
            let request = &request;
            async move {
                let started = tokio::time::Instant::now();
                let result = tokio::time::timeout(budget, adapter.search(request)).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                match result {
                    Ok(Ok(evidence)) => {
                        tracing::debug!(source = %kind, count = evidence.len(), elapsed_ms, "Source returned");
                        let outcome = RetrievalOutcome {
                            source: kind,
                            status: SourceStatus::Ok,
                            evidence_ids: evidence.iter().map(|e| e.id.clone()).collect(),
                            elapsed_ms,
                            error: None,
                        };
                        (outcome, evidence)
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(source = %kind, error = %e, elapsed_ms, "Source failed");
                        (failed(kind, SourceStatus::Error, elapsed_ms, e.to_string()), Vec::new())
                    }
                    Err(_) => {
                        tracing::warn!(source = %kind, budget_ms = budget.as_millis() as u64, "Source timed out");
                        let detail = format!("no response within {}ms", budget.as_millis());
                        (failed(kind, SourceStatus::Timeout, elapsed_ms, detail), Vec::new())
                    }
                }
            }
            .instrument(tracing::debug_span!("source_search", source = %kind))
        });

        let results = join_all(searches).await;

        let mut outcomes = BTreeMap::new();
        let mut per_source = Vec::with_capacity(results.len());
        for (outcome, evidence) in results {
            per_source.push((outcome.source, evidence));
            outcomes.insert(outcome.source, outcome);
        }

        if self.index_literature_hits {
            self.spawn_literature_indexing(&outcomes, &per_source);
        }

        let evidence = merge_evidence(per_source, &weights);
        RetrievalReport {
            evidence,
            outcomes,
            weights,
        }
    }
}

impl RetrievalCoordinator {
    fn vector_backend(&self) -> Option<Arc<dyn VectorBackend>> {
        self.adapters.iter().find_map(|adapter| match adapter {
            EvidenceAdapter::Vector(backend) => Some(backend.clone()),
            _ => None,
        })
    }

    /// Index this request's literature hits. Only an `ok` literature
    /// outcome with at least one hit is indexed.
    fn spawn_literature_indexing(
        &self,
        outcomes: &BTreeMap<SourceKind, RetrievalOutcome>,
        per_source: &[(SourceKind, Vec<Evidence>)],
    ) {
        let literature_ok = outcomes
            .get(&SourceKind::Literature)
            .is_some_and(RetrievalOutcome::is_ok);
        if !literature_ok {
            return;
        }
        let Some(backend) = self.vector_backend() else {
            return;
        };
        let hits: Vec<Evidence> = per_source
            .iter()
            .filter(|(kind, _)| *kind == SourceKind::Literature)
            .flat_map(|(_, evidence)| evidence.iter().cloned())
            .collect();
        if hits.is_empty() {
            return;
        }

        tokio::spawn(
            async move {
                match backend.index(&hits).await {
                    Ok(added) => tracing::debug!(offered = hits.len(), added, "Literature hits indexed"),
                    Err(e) => tracing::warn!(error = %e, "Literature indexing failed"),
                }
            }
            .instrument(tracing::debug_span!("literature_indexing")),
        );
    }
}

fn failed(kind: SourceKind, status: SourceStatus, elapsed_ms: u64, error: String) -> RetrievalOutcome {
    RetrievalOutcome {
        source: kind,
        status,
        evidence_ids: Vec::new(),
        elapsed_ms,
        error: Some(error),
    }
}

/// Canonical evidence order: weighted relevance descending, then source
/// priority (guideline, literature, vector).
pub fn evidence_order(a: &Evidence, b: &Evidence) -> Ordering {
    b.weighted_relevance
        .total_cmp(&a.weighted_relevance)
        .then_with(|| a.source.priority().cmp(&b.source.priority()))
}

/// Apply source weights, order, and collapse duplicate ids keeping the
/// best-ranked copy. Within a source the adapter's own rank breaks ties.
pub fn merge_evidence(
    per_source: Vec<(SourceKind, Vec<Evidence>)>,
    weights: &WeightSnapshot,
) -> Vec<Evidence> {
    let mut ranked: Vec<(usize, Evidence)> = Vec::new();
    for (kind, evidence) in per_source {
        let weight = weights.get(kind);
        for (rank, mut item) in evidence.into_iter().enumerate() {
            item.source = kind;
            item.weighted_relevance = item.relevance * weight;
            ranked.push((rank, item));
        }
    }

    ranked.sort_by(|(rank_a, a), (rank_b, b)| evidence_order(a, b).then(rank_a.cmp(rank_b)));

    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .map(|(_, e)| e)
        .filter(|e| seen.insert(e.id.clone()))
        .collect()
}
