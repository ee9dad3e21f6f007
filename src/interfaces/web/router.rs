use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{flows, providers, stores};

fn build_localhost_cors(api_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_api_router(state: AppState) -> Router {
    let cors = build_localhost_cors(state.api_port);

    Router::new()
        .route("/api/flows", get(flows::list_flows))
        .route("/api/flows/{flow}/run", post(flows::run_flow))
        .route("/api/providers", get(providers::get_providers))
        .route("/api/stores/{store}", get(stores::get_store))
        .route(
            "/api/stores/{store}/{key}",
            get(stores::get_entry)
                .put(stores::set_entry)
                .delete(stores::delete_entry),
        )
        .route("/api/logs", get(super::sse_logs_endpoint))
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flows::FlowCatalog;
    use crate::core::llm::{LlmManager, MockProvider, MockReply, ProviderRegistry};
    use crate::core::store::{MemoryBackend, StorageBackend};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn state_with(mock: Option<MockProvider>) -> AppState {
        let mut llm = LlmManager::new();
        if let Some(mock) = mock {
            llm.register_provider(Arc::new(mock));
            llm.set_active("mock", "mock-model");
        }
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
        let (log_tx, _) = tokio::sync::broadcast::channel(16);
        AppState::new(
            FlowCatalog::builtin().unwrap(),
            llm,
            ProviderRegistry::load().unwrap(),
            storage,
            log_tx,
            17990,
        )
    }

    async fn json_request(
        app: Router,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let body = match body {
            Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
            None => Body::empty(),
        };

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body_bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&body_bytes).unwrap_or(serde_json::json!({}));
        (status, json)
    }

    #[tokio::test]
    async fn lists_builtin_flows() {
        let app = build_api_router(state_with(None));
        let (status, body) = json_request(app, Method::GET, "/api/flows", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["flows"][0]["id"], "faq");
        assert_eq!(body["flows"][1]["id"], "trending-topics");
        assert_eq!(body["flows"][1]["schema"]["properties"]["topics"]["minItems"], 5);
    }

    #[tokio::test]
    async fn run_flow_returns_validated_data() {
        let mock = MockProvider::new("mock").with_reply(MockReply::Payload(json!({
            "faqs": [{ "question": "Q1", "answer": "A1" }]
        })));
        let app = build_api_router(state_with(Some(mock)));
        let (_, body) = json_request(app, Method::POST, "/api/flows/faq/run", Some(json!({}))).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], json!({ "faqs": [{ "question": "Q1", "answer": "A1" }] }));
    }

    #[tokio::test]
    async fn run_flow_reports_reason_on_invalid_shape() {
        let mock =
            MockProvider::new("mock").with_reply(MockReply::Payload(json!({ "faqs": null })));
        let app = build_api_router(state_with(Some(mock)));
        let (_, body) = json_request(app, Method::POST, "/api/flows/faq/run", Some(json!({}))).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["reason"], "invalid_shape");
        assert!(body["error"].as_str().unwrap().contains("faq"));
    }

    #[tokio::test]
    async fn optional_run_renders_nothing_on_failure() {
        let mock = MockProvider::new("mock").with_reply(MockReply::Failure("down".to_string()));
        let app = build_api_router(state_with(Some(mock)));
        let (_, body) = json_request(
            app,
            Method::POST,
            "/api/flows/trending-topics/run",
            Some(json!({ "optional": true })),
        )
        .await;
        assert_eq!(body["success"], true);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn unknown_flow_and_missing_provider_are_errors() {
        let app = build_api_router(state_with(None));
        let (_, body) =
            json_request(app.clone(), Method::POST, "/api/flows/nope/run", Some(json!({}))).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("not found"));

        let (_, body) = json_request(app, Method::POST, "/api/flows/faq/run", Some(json!({}))).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["reason"], "provider_call_failed");
    }

    #[tokio::test]
    async fn providers_endpoint_shows_active_selection() {
        let app = build_api_router(state_with(Some(MockProvider::new("mock"))));
        let (_, body) = json_request(app, Method::GET, "/api/providers", None).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["active"]["provider"], "mock");
        let google = body["providers"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["id"] == "google")
            .unwrap();
        assert_eq!(google["configured"], false);
    }

    #[tokio::test]
    async fn store_entries_can_be_set_read_and_deleted() {
        let app = build_api_router(state_with(None));

        let (_, body) = json_request(
            app.clone(),
            Method::PUT,
            "/api/stores/user-flags/onboarded",
            Some(json!({ "value": true })),
        )
        .await;
        assert_eq!(body["success"], true);

        let (_, body) =
            json_request(app.clone(), Method::GET, "/api/stores/user-flags/onboarded", None).await;
        assert_eq!(body["value"], true);

        let (_, body) = json_request(app.clone(), Method::GET, "/api/stores/user-flags", None).await;
        assert_eq!(body["entries"], json!({ "onboarded": true }));

        let (_, body) = json_request(
            app.clone(),
            Method::DELETE,
            "/api/stores/user-flags/onboarded",
            None,
        )
        .await;
        assert_eq!(body["success"], true);

        let (_, body) = json_request(app, Method::GET, "/api/stores/user-flags/onboarded", None).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn invalid_store_name_is_rejected() {
        let app = build_api_router(state_with(None));
        let (_, body) = json_request(app, Method::GET, "/api/stores/Bad%20Name", None).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("invalid store name"));
    }

    #[tokio::test]
    async fn security_headers_present_on_responses() {
        let app = build_api_router(state_with(None));
        let req = Request::builder()
            .method(Method::GET)
            .uri("/api/flows")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(
            resp.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
    }
}
