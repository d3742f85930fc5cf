//! API middleware.
//!
//! Execution order (outermost → innermost):
//! 1. Correlation id: reuse or generate, open the request span
//! 2. Cache-Control: `no-store` on every response

pub mod correlation;

use axum::http::{header, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

/// Clinical responses must never be cached by intermediaries.
pub fn no_store() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
}
