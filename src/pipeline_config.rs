//! Pipeline configuration.
//!
//! Every tunable of the differential pipeline lives here: per-source timeouts,
//! the context budget, the relevance floor, retry bounds, the feedback EMA
//! rate and the collaborator endpoints. Defaults are tuned for a local Ollama
//! instance; `from_env()` applies `DIFFERENTIAL_*` overrides on top.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::config::{env_parse, env_string};
use crate::models::SourceKind;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Per-source retrieval timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceTimeouts {
    pub literature: Duration,
    pub vector: Duration,
    pub guideline: Duration,
}

impl SourceTimeouts {
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            literature: timeout,
            vector: timeout,
            guideline: timeout,
        }
    }

    pub fn for_source(&self, kind: SourceKind) -> Duration {
        match kind {
            SourceKind::Literature => self.literature,
            SourceKind::Vector => self.vector,
            SourceKind::Guideline => self.guideline,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub source_timeouts: SourceTimeouts,
    /// Deadline wrapped around the whole request. `None` disables it.
    pub request_deadline: Option<Duration>,
    /// Context budget in characters (tokens × chars-per-token).
    pub context_budget_chars: usize,
    /// Evidence below this weighted relevance never enters the context.
    pub min_relevance: f64,
    /// Corrective retries after the first synthesis attempt.
    pub max_synthesis_retries: u32,
    /// Upper bound on candidates in a result.
    pub max_candidates: usize,
    /// EMA smoothing factor for feedback-driven weight updates.
    pub feedback_alpha: f64,
    pub literature_max_results: usize,
    pub vector_top_k: usize,
    pub vector_min_similarity: f32,
    pub ollama_url: String,
    pub ollama_model: String,
    pub provider_timeout: Duration,
    pub pubmed_base_url: String,
    pub pubmed_api_key: Option<String>,
    /// JSON corpus for the vector index. Empty index when unset.
    pub corpus_path: Option<PathBuf>,
    /// JSON-lines audit file. Tracing only when unset.
    pub audit_log_path: Option<PathBuf>,
    pub bind_addr: String,
    /// Candidates kept for feedback lookup; oldest evicted first.
    pub ledger_capacity: usize,
    /// Feedback records retained in memory. Rating counts are lifetime.
    pub feedback_log_capacity: usize,
    /// Feed literature hits into the vector index for later requests.
    pub index_literature_hits: bool,
}

/// Approximate characters per token for budget estimation.
pub const CHARS_PER_TOKEN: usize = 4;

/// Maximum context tokens handed to the reasoning model.
pub const MAX_CONTEXT_TOKENS: usize = 3000;

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_timeouts: SourceTimeouts::uniform(Duration::from_secs(4)),
            request_deadline: Some(Duration::from_secs(180)),
            context_budget_chars: MAX_CONTEXT_TOKENS * CHARS_PER_TOKEN,
            min_relevance: 0.3,
            max_synthesis_retries: 2,
            max_candidates: 5,
            feedback_alpha: 0.2,
            literature_max_results: 8,
            vector_top_k: 8,
            vector_min_similarity: 0.2,
            ollama_url: "http://localhost:11434".into(),
            ollama_model: "medgemma".into(),
            provider_timeout: Duration::from_secs(120),
            pubmed_base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".into(),
            pubmed_api_key: None,
            corpus_path: None,
            audit_log_path: None,
            bind_addr: "127.0.0.1:8088".into(),
            ledger_capacity: 10_000,
            feedback_log_capacity: 1000,
            index_literature_hits: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Environment overrides
// ═══════════════════════════════════════════════════════════

impl PipelineConfig {
    /// Defaults with `DIFFERENTIAL_*` overrides applied.
    ///
    /// Out-of-range values are ignored with a warning and the default kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>("SOURCE_TIMEOUT_MS") {
            config.source_timeouts = SourceTimeouts::uniform(Duration::from_millis(ms));
        }
        if let Some(ms) = env_parse::<u64>("LITERATURE_TIMEOUT_MS") {
            config.source_timeouts.literature = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("VECTOR_TIMEOUT_MS") {
            config.source_timeouts.vector = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("GUIDELINE_TIMEOUT_MS") {
            config.source_timeouts.guideline = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("REQUEST_DEADLINE_SECS") {
            config.request_deadline = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(tokens) = env_parse::<usize>("CONTEXT_TOKENS") {
            if tokens >= 256 {
                config.context_budget_chars = tokens * CHARS_PER_TOKEN;
            } else {
                warn_out_of_range("CONTEXT_TOKENS");
            }
        }
        if let Some(v) = env_parse::<f64>("MIN_RELEVANCE") {
            if (0.0..=1.0).contains(&v) {
                config.min_relevance = v;
            } else {
                warn_out_of_range("MIN_RELEVANCE");
            }
        }
        if let Some(v) = env_parse::<u32>("SYNTHESIS_RETRIES") {
            if v <= 5 {
                config.max_synthesis_retries = v;
            } else {
                warn_out_of_range("SYNTHESIS_RETRIES");
            }
        }
        if let Some(v) = env_parse::<f64>("FEEDBACK_ALPHA") {
            if v > 0.0 && v <= 1.0 {
                config.feedback_alpha = v;
            } else {
                warn_out_of_range("FEEDBACK_ALPHA");
            }
        }
        if let Some(v) = env_parse::<usize>("LITERATURE_MAX_RESULTS") {
            config.literature_max_results = v.max(1);
        }
        if let Some(v) = env_parse::<usize>("VECTOR_TOP_K") {
            config.vector_top_k = v.max(1);
        }
        if let Some(v) = env_string("OLLAMA_URL") {
            config.ollama_url = v;
        }
        if let Some(v) = env_string("OLLAMA_MODEL") {
            config.ollama_model = v;
        }
        if let Some(secs) = env_parse::<u64>("PROVIDER_TIMEOUT_SECS") {
            config.provider_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(v) = env_string("PUBMED_BASE_URL") {
            config.pubmed_base_url = v;
        }
        config.pubmed_api_key = env_string("PUBMED_API_KEY");
        config.corpus_path = env_string("CORPUS_PATH").map(PathBuf::from);
        config.audit_log_path = env_string("AUDIT_LOG").map(PathBuf::from);
        if let Some(v) = env_string("BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Some(v) = env_parse::<usize>("LEDGER_CAPACITY") {
            config.ledger_capacity = v.max(1);
        }
        if let Some(v) = env_parse::<usize>("FEEDBACK_LOG_CAPACITY") {
            config.feedback_log_capacity = v.max(1);
        }
        if let Some(v) = env_parse::<bool>("INDEX_LITERATURE_HITS") {
            config.index_literature_hits = v;
        }

        config
    }
}

fn warn_out_of_range(key: &str) {
    tracing::warn!(key, "Config override out of range, keeping default");
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
