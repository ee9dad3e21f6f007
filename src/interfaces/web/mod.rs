mod handlers;
mod router;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

pub use router::build_api_router;

use crate::core::flows::FlowCatalog;
use crate::core::llm::{LlmManager, ProviderRegistry};
use crate::core::store::StorageBackend;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<FlowCatalog>,
    pub llm: Arc<LlmManager>,
    pub provider_registry: Arc<ProviderRegistry>,
    pub storage: Arc<dyn StorageBackend>,
    /// Serializes load-modify-save cycles on preference stores.
    pub store_lock: Arc<Mutex<()>>,
    pub log_tx: broadcast::Sender<String>,
    pub api_port: u16,
}

impl AppState {
    pub fn new(
        catalog: FlowCatalog,
        llm: LlmManager,
        provider_registry: ProviderRegistry,
        storage: Arc<dyn StorageBackend>,
        log_tx: broadcast::Sender<String>,
        api_port: u16,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            llm: Arc::new(llm),
            provider_registry: Arc::new(provider_registry),
            storage,
            store_lock: Arc::new(Mutex::new(())),
            log_tx,
            api_port,
        }
    }
}

// --- SSE Logs (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream)
}

/// Bind and serve the API until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let app = build_api_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding API server to {}", addr))?;
    info!("API Server running at http://{addr}");
    axum::serve(listener, app)
        .await
        .context("API server stopped unexpectedly")?;
    Ok(())
}
