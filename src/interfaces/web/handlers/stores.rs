use axum::{
    Json,
    extract::{Path, State},
};

use super::super::AppState;
use crate::core::store::PreferenceStore;

pub async fn get_store(
    Path(store): Path<String>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    match PreferenceStore::open(&store, state.storage.clone()).await {
        Ok(s) => Json(serde_json::json!({ "success": true, "entries": s.entries() })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn get_entry(
    Path((store, key)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    match PreferenceStore::open(&store, state.storage.clone()).await {
        Ok(s) => match s.get(&key) {
            Some(value) => Json(serde_json::json!({ "success": true, "value": value })),
            None => Json(serde_json::json!({
                "success": false,
                "error": format!("Key '{}' not found in store '{}'", key, store),
            })),
        },
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

#[derive(serde::Deserialize)]
pub struct SetEntryRequest {
    value: serde_json::Value,
}

pub async fn set_entry(
    Path((store, key)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(payload): Json<SetEntryRequest>,
) -> Json<serde_json::Value> {
    let _guard = state.store_lock.lock().await;
    let mut s = match PreferenceStore::open(&store, state.storage.clone()).await {
        Ok(s) => s,
        Err(e) => return Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    };
    s.set(key, payload.value);
    match s.save().await {
        Ok(_) => Json(serde_json::json!({ "success": true, "message": "Entry saved" })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn delete_entry(
    Path((store, key)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    let _guard = state.store_lock.lock().await;
    let mut s = match PreferenceStore::open(&store, state.storage.clone()).await {
        Ok(s) => s,
        Err(e) => return Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    };
    if s.remove(&key).is_none() {
        return Json(serde_json::json!({ "success": true, "message": "Entry already absent" }));
    }
    match s.save().await {
        Ok(_) => Json(serde_json::json!({ "success": true, "message": "Entry removed" })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}
