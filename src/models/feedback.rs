use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{FeedbackRating, SourceKind};

/// Clinician verdict on one diagnosis candidate. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub diagnosis_id: Uuid,
    pub rating: FeedbackRating,
    pub correction: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(diagnosis_id: Uuid, rating: FeedbackRating, correction: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            diagnosis_id,
            rating,
            correction,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackAck {
    pub feedback_id: Uuid,
    pub diagnosis_id: Uuid,
    /// Sources whose weight moved. Empty when the candidate cited nothing.
    pub updated_sources: Vec<SourceKind>,
    pub weights_version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub total_feedbacks: usize,
    pub accurate: usize,
    pub partially_accurate: usize,
    pub inaccurate: usize,
    pub with_correction: usize,
    /// Share of ratings that were fully accurate, 0.0 when empty.
    pub accuracy_rate: f64,
    /// Most frequent corrections in the retained log, most common first.
    #[serde(default)]
    pub common_corrections: Vec<CorrectionCount>,
}

/// A normalised correction and how often clinicians submitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionCount {
    pub correction: String,
    pub count: usize,
}
