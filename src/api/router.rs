//! HTTP router.
//!
//! Routes are nested under `/api/`. Middleware stack (outermost →
//! innermost): correlation id → Cache-Control → handler.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/diagnosis", post(endpoints::diagnosis::generate))
        .route("/feedback", post(endpoints::feedback::record))
        .route("/feedback/stats", get(endpoints::feedback::stats))
        .route("/weights", get(endpoints::weights::current));

    Router::new()
        .nest("/api", api)
        .fallback(endpoints::not_found)
        .with_state(ctx)
        .layer(middleware::no_store())
        .layer(axum::middleware::from_fn(middleware::correlation::propagate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::middleware::correlation::CORRELATION_HEADER;
    use crate::models::{Evidence, SourceKind};
    use crate::pipeline::patient::InMemoryPatientStore;
    use crate::pipeline::synthesis::ProviderError;
    use crate::pipeline::testing::{scripted_adapter, Reply, Script, ScriptedProvider};
    use crate::pipeline_config::PipelineConfig;

    fn answer() -> String {
        json!({
            "differential_diagnoses": [
                {
                    "diagnosis": "Community-acquired pneumonia",
                    "icd10_code": "J18.9",
                    "confidence": 0.8,
                    "reasoning": "Fever and productive cough.",
                    "supporting_evidence": ["pmid:111", "guideline:cap-idsa-ats"]
                },
                {
                    "diagnosis": "Acute bronchitis",
                    "confidence": 0.4,
                    "reasoning": "Cough predominant.",
                    "supporting_evidence": []
                }
            ],
            "clinical_reasoning": "Likely lower respiratory infection."
        })
        .to_string()
    }

    fn test_core(provider: ScriptedProvider) -> Arc<CoreState> {
        let (lit, _) = scripted_adapter(
            SourceKind::Literature,
            Script::Return(vec![Evidence::new(
                SourceKind::Literature,
                "pmid:111",
                "Pneumonia in adults",
                0.9,
            )]),
        );
        let (gl, _) = scripted_adapter(
            SourceKind::Guideline,
            Script::Return(vec![Evidence::new(
                SourceKind::Guideline,
                "guideline:cap-idsa-ats",
                "CAP guideline",
                0.95,
            )]),
        );
        let (vec, _) = scripted_adapter(SourceKind::Vector, Script::Return(vec![]));
        Arc::new(CoreState::new(
            PipelineConfig::default(),
            vec![lit, vec, gl],
            Arc::new(provider),
            Arc::new(InMemoryPatientStore::new()),
            None,
        ))
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn response_json(response: axum::http::Response<axum::body::Body>) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn query_body() -> Value {
        json!({
            "chief_complaint": "cough and fever",
            "symptoms": [{"name": "cough", "severity": "moderate"}],
            "vitals": {"temperature": 38.7}
        })
    }

    #[tokio::test]
    async fn health_reports_version_and_sources() {
        let app = api_router(test_core(ScriptedProvider::texts([answer()])));
        let response = app.oneshot(get_request("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert!(response.headers().contains_key(CORRELATION_HEADER));

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
        assert_eq!(json["sources"].as_array().unwrap().len(), 3);
        assert_eq!(json["weights_version"], 0);
    }

    #[tokio::test]
    async fn correlation_id_is_propagated() {
        let app = api_router(test_core(ScriptedProvider::texts([answer()])));
        let request = Request::builder()
            .uri("/api/weights")
            .header(CORRELATION_HEADER, "req-42")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[CORRELATION_HEADER], "req-42");
    }

    #[tokio::test]
    async fn diagnosis_returns_ranked_result() {
        let app = api_router(test_core(ScriptedProvider::texts([answer()])));
        let response = app
            .oneshot(json_request("POST", "/api/diagnosis", &query_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let json = response_json(response).await;
        assert_eq!(json["completeness"], "partial");
        let candidates = json["candidates"].as_array().unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0]["name"], "Community-acquired pneumonia");
        assert_eq!(json["source_outcomes"]["vector"]["status"], "ok");
    }

    #[tokio::test]
    async fn empty_symptoms_is_unprocessable() {
        let app = api_router(test_core(ScriptedProvider::texts([answer()])));
        let body = json!({"chief_complaint": "cough", "symptoms": []});
        let response = app
            .oneshot(json_request("POST", "/api/diagnosis", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = api_router(test_core(ScriptedProvider::texts([answer()])));
        let request = Request::builder()
            .method("POST")
            .uri("/api/diagnosis")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn synthesis_failure_is_bad_gateway() {
        let provider = ScriptedProvider::new(vec![Reply::Error(ProviderError::Connection(
            "http://localhost:11434".into(),
        ))]);
        let app = api_router(test_core(provider));
        let response = app
            .oneshot(json_request("POST", "/api/diagnosis", &query_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "SYNTHESIS_FAILED");
    }

    #[tokio::test]
    async fn feedback_round_trip_moves_weights() {
        let core = test_core(ScriptedProvider::texts([answer()]));

        let response = api_router(core.clone())
            .oneshot(json_request("POST", "/api/diagnosis", &query_body()))
            .await
            .unwrap();
        let result = response_json(response).await;
        let candidate_id = result["candidates"][0]["id"].as_str().unwrap().to_string();

        let feedback = json!({
            "diagnosis_id": candidate_id,
            "rating": "accurate",
            "correction": "confirmed on imaging"
        });
        let response = api_router(core.clone())
            .oneshot(json_request("POST", "/api/feedback", &feedback))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let ack = response_json(response).await;
        assert_eq!(ack["updated_sources"], json!(["literature", "guideline"]));
        assert_eq!(ack["weights_version"], 2);

        let response = api_router(core.clone())
            .oneshot(get_request("/api/weights"))
            .await
            .unwrap();
        let weights = response_json(response).await;
        assert_eq!(weights["version"], 2);
        assert!(weights["weights"]["literature"].as_f64().unwrap() > 1.0);
        assert_eq!(weights["weights"]["vector"], 1.0);

        let response = api_router(core)
            .oneshot(get_request("/api/feedback/stats"))
            .await
            .unwrap();
        let stats = response_json(response).await;
        assert_eq!(stats["total_feedbacks"], 1);
        assert_eq!(stats["accurate"], 1);
        assert_eq!(stats["with_correction"], 1);
        assert_eq!(stats["common_corrections"][0]["correction"], "confirmed on imaging");
        assert_eq!(stats["common_corrections"][0]["count"], 1);
    }

    #[tokio::test]
    async fn feedback_for_unknown_diagnosis_is_not_found() {
        let app = api_router(test_core(ScriptedProvider::texts([answer()])));
        let feedback = json!({
            "diagnosis_id": uuid::Uuid::new_v4(),
            "rating": "inaccurate"
        });
        let response = app
            .oneshot(json_request("POST", "/api/feedback", &feedback))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn feedback_with_unknown_rating_is_unprocessable() {
        let app = api_router(test_core(ScriptedProvider::texts([answer()])));
        let feedback = json!({
            "diagnosis_id": uuid::Uuid::new_v4(),
            "rating": "meh"
        });
        let response = app
            .oneshot(json_request("POST", "/api/feedback", &feedback))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_route_has_structured_404() {
        let app = api_router(test_core(ScriptedProvider::texts([answer()])));
        let response = app.oneshot(get_request("/api/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }
}
