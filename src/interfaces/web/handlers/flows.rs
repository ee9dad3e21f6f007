use axum::{
    Json,
    extract::{Path, State},
};
use std::collections::HashMap;

use super::super::AppState;
use crate::core::flows::{GenerationError, RuntimeInputs, StructuredGenerator};

pub async fn list_flows(State(state): State<AppState>) -> Json<serde_json::Value> {
    let flows: Vec<serde_json::Value> = state
        .catalog
        .list()
        .iter()
        .map(|f| {
            serde_json::json!({
                "id": f.identifier(),
                "description": f.description(),
                "schema": f.output_schema().to_json_schema(),
            })
        })
        .collect();
    Json(serde_json::json!({ "success": true, "flows": flows }))
}

#[derive(serde::Deserialize)]
pub struct RunFlowRequest {
    #[serde(default)]
    inputs: HashMap<String, String>,
    #[serde(default)]
    args: Vec<String>,
    /// Decorative content: report failures as an absent result.
    #[serde(default)]
    optional: bool,
}

fn generation_error_json(e: &GenerationError) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": false,
        "reason": e.reason(),
        "error": e.to_string(),
    }))
}

pub async fn run_flow(
    Path(flow_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<RunFlowRequest>,
) -> Json<serde_json::Value> {
    let Some(flow) = state.catalog.get(&flow_id) else {
        return Json(serde_json::json!({
            "success": false,
            "error": format!("Flow '{}' not found", flow_id),
        }));
    };

    let generator = match StructuredGenerator::from_manager(&state.llm) {
        Ok(g) => g,
        Err(e) => {
            return Json(serde_json::json!({
                "success": false,
                "reason": "provider_call_failed",
                "error": e.to_string(),
            }));
        }
    };

    let inputs = RuntimeInputs {
        positional: payload.args,
        named: payload.inputs,
    };

    if payload.optional {
        let data = generator
            .execute_optional(flow, Some(&inputs))
            .await
            .map(|d| d.into_value());
        return Json(serde_json::json!({ "success": true, "data": data }));
    }

    match generator.execute(flow, Some(&inputs)).await {
        Ok(data) => Json(serde_json::json!({ "success": true, "data": data.into_value() })),
        Err(e) => generation_error_json(&e),
    }
}
