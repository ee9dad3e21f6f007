use axum::{Json, extract::State};

use super::super::AppState;

pub async fn get_providers(State(state): State<AppState>) -> Json<serde_json::Value> {
    let registered = state.llm.list_providers();
    let providers: Vec<serde_json::Value> = state
        .provider_registry
        .providers
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "name": p.name,
                "default_model": p.default_model,
                "models": p.models,
                "configured": registered.contains(&p.id),
            })
        })
        .collect();

    let (active_provider, active_model) = state.llm.get_active_info();
    Json(serde_json::json!({
        "success": true,
        "providers": providers,
        "active": { "provider": active_provider, "model": active_model },
    }))
}
