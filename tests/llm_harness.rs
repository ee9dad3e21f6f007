#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::post,
};
use bizstudio::core::llm::{ApiFormat, AuthConfig, AuthType, ModelDef, ProviderDef};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// What the mock endpoint sends back for one request.
#[derive(Debug, Clone)]
pub enum Canned {
    /// 200 with this value serialized as the assistant message content.
    Content(Value),
    /// 200 with this raw assistant text.
    Text(String),
    /// Non-2xx status with a short body.
    Status(u16),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<RecordedMessage>,
    #[serde(default)]
    pub response_format: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedMessage {
    pub role: String,
    pub content: String,
}

/// A `generateContent` call as it arrived on the wire.
#[derive(Debug, Clone)]
pub struct RecordedGeminiCall {
    /// Last path segment, e.g. `gemini-test:generateContent`.
    pub action: String,
    pub query: HashMap<String, String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockServerState {
    replies: Arc<Mutex<VecDeque<Canned>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    gemini_calls: Arc<Mutex<Vec<RecordedGeminiCall>>>,
}

impl MockServerState {
    fn next_reply(&self) -> Canned {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Canned::Status(500))
    }
}

fn canned_status(code: u16) -> axum::response::Response {
    use axum::response::IntoResponse;

    let status = axum::http::StatusCode::from_u16(code)
        .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    (status, "mock upstream failure").into_response()
}

/// OpenAI chat completions and Gemini `generateContent` endpoints on a
/// local port, answering from one queue of canned replies.
pub struct MockLlmServer {
    pub port: u16,
    replies: Arc<Mutex<VecDeque<Canned>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    gemini_calls: Arc<Mutex<Vec<RecordedGeminiCall>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

async fn mock_chat_completion(
    State(state): State<MockServerState>,
    Json(payload): Json<RecordedRequest>,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    state
        .requests
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(payload);

    let content = match state.next_reply() {
        Canned::Content(value) => value.to_string(),
        Canned::Text(text) => text,
        Canned::Status(code) => return canned_status(code),
    };

    Json(json!({
        "choices": [{
            "message": { "role": "assistant", "content": content }
        }]
    }))
    .into_response()
}

async fn mock_generate_content(
    State(state): State<MockServerState>,
    Path(action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    state
        .gemini_calls
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(RecordedGeminiCall {
            action,
            query,
            body,
        });

    let text = match state.next_reply() {
        Canned::Content(value) => value.to_string(),
        Canned::Text(text) => text,
        Canned::Status(code) => return canned_status(code),
    };

    // Split the answer over two parts; clients must join them.
    let mid = text
        .char_indices()
        .nth(text.chars().count() / 2)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let (head, tail) = text.split_at(mid);
    Json(json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "text": head }, { "text": tail }]
            },
            "finishReason": "STOP"
        }]
    }))
    .into_response()
}

impl MockLlmServer {
    pub async fn start(replies: Vec<Canned>) -> TestResult<Self> {
        let port = find_free_port()?;
        let replies = Arc::new(Mutex::new(VecDeque::from(replies)));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let gemini_calls = Arc::new(Mutex::new(Vec::new()));
        let state = MockServerState {
            replies: Arc::clone(&replies),
            requests: Arc::clone(&requests),
            gemini_calls: Arc::clone(&gemini_calls),
        };
        let app = Router::new()
            .route("/v1/chat/completions", post(mock_chat_completion))
            .route("/v1beta/models/{action}", post(mock_generate_content))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            port,
            replies,
            requests,
            gemini_calls,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/v1/chat/completions", self.port)
    }

    pub fn provider_def(&self) -> ProviderDef {
        ProviderDef {
            id: "mock-openai".to_string(),
            name: "Mock OpenAI".to_string(),
            api_format: ApiFormat::Openai,
            base_url: self.base_url(),
            auth: AuthConfig {
                auth_type: AuthType::Bearer,
                param_name: None,
                header_name: None,
                api_key_env: "MOCK_OPENAI_API_KEY".to_string(),
            },
            default_model: "mock-model".to_string(),
            models: vec![ModelDef {
                id: "mock-model".to_string(),
                name: "Mock Model".to_string(),
            }],
            extra_headers: HashMap::new(),
        }
    }

    /// Gemini-format entry pointing at this server, key sent as `?key=`.
    pub fn gemini_provider_def(&self) -> ProviderDef {
        ProviderDef {
            id: "mock-gemini".to_string(),
            name: "Mock Gemini".to_string(),
            api_format: ApiFormat::Gemini,
            base_url: format!(
                "http://127.0.0.1:{}/v1beta/models/{{model}}:generateContent",
                self.port
            ),
            auth: AuthConfig {
                auth_type: AuthType::QueryParam,
                param_name: Some("key".to_string()),
                header_name: None,
                api_key_env: "MOCK_GEMINI_API_KEY".to_string(),
            },
            default_model: "gemini-test".to_string(),
            models: vec![ModelDef {
                id: "gemini-test".to_string(),
                name: "Gemini Test".to_string(),
            }],
            extra_headers: HashMap::new(),
        }
    }

    pub fn gemini_calls(&self) -> Vec<RecordedGeminiCall> {
        self.gemini_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

pub fn find_free_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}
