use axum::extract::State;
use axum::Json;

use crate::api::types::ApiContext;
use crate::pipeline::feedback::WeightSnapshot;

/// `GET /api/weights`
pub async fn current(State(ctx): State<ApiContext>) -> Json<WeightSnapshot> {
    Json(ctx.core.weights())
}
