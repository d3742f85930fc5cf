//! Shared API state and request bodies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_state::CoreState;
use crate::models::{ClinicalQuery, FeedbackRating};

/// State handed to every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// `POST /api/diagnosis` body: a clinical query plus an optional patient
/// whose stored history fills in missing history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisRequest {
    #[serde(flatten)]
    pub query: ClinicalQuery,
    #[serde(default)]
    pub patient_id: Option<String>,
}

/// `POST /api/feedback` body. `diagnosis_id` is a candidate id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub diagnosis_id: Uuid,
    pub rating: FeedbackRating,
    #[serde(default)]
    pub correction: Option<String>,
}
