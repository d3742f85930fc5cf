//! Differential diagnosis endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DiagnosisRequest};
use crate::models::DifferentialDiagnosisResult;

/// `POST /api/diagnosis`
///
/// 422 for an invalid query, 502 when no valid differential could be
/// synthesised, 504 when the request deadline fires.
pub async fn generate(
    State(ctx): State<ApiContext>,
    payload: Result<Json<DiagnosisRequest>, JsonRejection>,
) -> Result<Json<DifferentialDiagnosisResult>, ApiError> {
    let Json(request) = payload?;
    let result = ctx
        .core
        .generate_differential(request.query, request.patient_id.as_deref())
        .await?;
    Ok(Json(result))
}
