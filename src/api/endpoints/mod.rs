//! API endpoint handlers.

pub mod diagnosis;
pub mod feedback;
pub mod health;
pub mod weights;

use crate::api::error::ApiError;

/// Fallback for unknown routes, so they carry the structured error body.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("No such endpoint".into())
}
