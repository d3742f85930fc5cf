//! Clinician feedback endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, FeedbackRequest};
use crate::models::{FeedbackAck, FeedbackStats};

/// `POST /api/feedback`
pub async fn record(
    State(ctx): State<ApiContext>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FeedbackAck>), ApiError> {
    let Json(request) = payload?;
    let ack = ctx
        .core
        .record_feedback(request.diagnosis_id, request.rating, request.correction)?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

/// `GET /api/feedback/stats`
pub async fn stats(State(ctx): State<ApiContext>) -> Json<FeedbackStats> {
    Json(ctx.core.feedback_stats())
}
