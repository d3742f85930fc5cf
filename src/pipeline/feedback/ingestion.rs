//! Clinician feedback ingestion.
//!
//! Each rating is appended to a bounded in-memory log and folded into
//! running counters, then every source the rated candidate cited moves one
//! bounded EMA step toward the rating's target.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::ledger::DiagnosisLedger;
use super::weights::{SourceWeightState, MAX_SOURCE_WEIGHT, MIN_SOURCE_WEIGHT};
use super::FeedbackError;
use crate::models::{CorrectionCount, FeedbackAck, FeedbackRating, FeedbackRecord, FeedbackStats};

/// Corrections longer than this are rejected.
pub const MAX_CORRECTION_CHARS: usize = 2000;

/// Records retained when no capacity is given.
pub const DEFAULT_FEEDBACK_LOG_CAPACITY: usize = 1000;

/// Entries in `FeedbackStats::common_corrections`.
pub const COMMON_CORRECTIONS_LIMIT: usize = 5;

/// Weight a source is pulled toward by one rating.
pub fn rating_target(rating: FeedbackRating) -> f64 {
    match rating {
        FeedbackRating::Accurate => MAX_SOURCE_WEIGHT,
        FeedbackRating::PartiallyAccurate => 1.0,
        FeedbackRating::Inaccurate => MIN_SOURCE_WEIGHT,
    }
}

/// Case-, whitespace- and trailing-punctuation-insensitive form used to
/// group corrections.
pub fn normalize_correction(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!', ';', ','])
        .to_lowercase()
}

#[derive(Debug, Default)]
struct FeedbackLog {
    recent: VecDeque<FeedbackRecord>,
    /// Lifetime totals; unaffected by log eviction.
    totals: FeedbackStats,
}

pub struct FeedbackIngestor {
    ledger: Arc<DiagnosisLedger>,
    weights: Arc<SourceWeightState>,
    alpha: f64,
    capacity: usize,
    log: Mutex<FeedbackLog>,
}

impl FeedbackIngestor {
    pub fn new(ledger: Arc<DiagnosisLedger>, weights: Arc<SourceWeightState>, alpha: f64) -> Self {
        Self {
            ledger,
            weights,
            alpha,
            capacity: DEFAULT_FEEDBACK_LOG_CAPACITY,
            log: Mutex::new(FeedbackLog::default()),
        }
    }

    /// Keep at most `capacity` records; counts in `feedback_stats` still
    /// cover every rating ever recorded.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Record a rating for candidate `diagnosis_id` and adjust the weights
    /// of the sources it cited.
    pub fn record_feedback(
        &self,
        diagnosis_id: Uuid,
        rating: FeedbackRating,
        correction: Option<String>,
    ) -> Result<FeedbackAck, FeedbackError> {
        let correction = correction
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if let Some(c) = &correction {
            if c.chars().count() > MAX_CORRECTION_CHARS {
                return Err(FeedbackError::Invalid(format!(
                    "correction exceeds {MAX_CORRECTION_CHARS} characters"
                )));
            }
        }

        let provenance = self
            .ledger
            .lookup(&diagnosis_id)
            .ok_or(FeedbackError::UnknownDiagnosis(diagnosis_id))?;

        let record = FeedbackRecord::new(diagnosis_id, rating, correction);
        let feedback_id = record.id;
        {
            let mut log = self
                .log
                .lock()
                .map_err(|_| FeedbackError::Invalid("feedback log unavailable".into()))?;
            let totals = &mut log.totals;
            totals.total_feedbacks += 1;
            match rating {
                FeedbackRating::Accurate => totals.accurate += 1,
                FeedbackRating::PartiallyAccurate => totals.partially_accurate += 1,
                FeedbackRating::Inaccurate => totals.inaccurate += 1,
            }
            if record.correction.is_some() {
                totals.with_correction += 1;
            }
            log.recent.push_back(record);
            while log.recent.len() > self.capacity {
                log.recent.pop_front();
            }
        }

        let target = rating_target(rating);
        let mut weights_version = self.weights.version();
        for source in &provenance.cited_sources {
            let update = self.weights.update_ema(*source, target, self.alpha);
            weights_version = weights_version.max(update.version);
            tracing::info!(
                source = %source,
                rating = %rating,
                previous = update.previous,
                current = update.current,
                version = update.version,
                "Source weight updated"
            );
        }

        if provenance.cited_sources.is_empty() {
            tracing::info!(rating = %rating, "Feedback recorded; candidate cited no sources");
        }

        Ok(FeedbackAck {
            feedback_id,
            diagnosis_id,
            updated_sources: provenance.cited_sources,
            weights_version,
        })
    }

    pub fn feedback_stats(&self) -> FeedbackStats {
        let log = match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut stats = log.totals.clone();
        if stats.total_feedbacks > 0 {
            stats.accuracy_rate = stats.accurate as f64 / stats.total_feedbacks as f64;
        }
        stats.common_corrections = common_corrections(log.recent.iter(), COMMON_CORRECTIONS_LIMIT);
        stats
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> Vec<FeedbackRecord> {
        match self.log.lock() {
            Ok(guard) => guard.recent.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().recent.iter().cloned().collect(),
        }
    }
}

/// Top `limit` normalised corrections by count; ties break alphabetically.
fn common_corrections<'a>(
    records: impl Iterator<Item = &'a FeedbackRecord>,
    limit: usize,
) -> Vec<CorrectionCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for correction in records.filter_map(|r| r.correction.as_deref()) {
        let key = normalize_correction(correction);
        if !key.is_empty() {
            *counts.entry(key).or_default() += 1;
        }
    }

    let mut ranked: Vec<CorrectionCount> = counts
        .into_iter()
        .map(|(correction, count)| CorrectionCount { correction, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.correction.cmp(&b.correction)));
    ranked.truncate(limit);
    ranked
}
