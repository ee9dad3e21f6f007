use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::GenerationError;
use super::request::{GenerationRequest, RuntimeInputs};
use crate::core::llm::{ChatMessage, LlmManager, LlmProvider};

/// A payload that passed its request's output schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedData {
    identifier: String,
    data: Value,
}

impl GeneratedData {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_value(self) -> Value {
        self.data
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// Runs generation requests against one provider/model pair. Holds no
/// per-call state, so one instance can serve concurrent calls.
#[derive(Clone)]
pub struct StructuredGenerator {
    provider: Arc<dyn LlmProvider>,
    model_id: String,
}

impl StructuredGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
        }
    }

    pub fn from_manager(manager: &LlmManager) -> anyhow::Result<Self> {
        let (provider, model_id) = manager.active()?;
        Ok(Self::new(provider, model_id))
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn build_messages(request: &GenerationRequest, instruction: String) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(3);
        if let Some(system) = request.system_text() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::system(format!(
            "Respond only with a JSON object matching this JSON Schema:\n{}",
            request.output_schema().to_json_schema()
        )));
        messages.push(ChatMessage::user(instruction));
        messages
    }

    /// One provider call, validated. Nothing is retried.
    pub async fn execute(
        &self,
        request: &GenerationRequest,
        inputs: Option<&RuntimeInputs>,
    ) -> Result<GeneratedData, GenerationError> {
        let identifier = request.identifier().to_string();
        let run_id = Uuid::new_v4();
        let instruction = request.resolve_instruction(inputs)?;

        info!(
            flow = %identifier,
            %run_id,
            provider = %self.provider.provider_id(),
            model = %self.model_id,
            "running generation request"
        );

        let schema = request.output_schema();
        let messages = Self::build_messages(request, instruction);
        let payload = self
            .provider
            .generate_structured(&self.model_id, &messages, &schema.to_json_schema())
            .await
            .map_err(|source| GenerationError::ProviderCall {
                identifier: identifier.clone(),
                source,
            })?
            .filter(|value| !value.is_null())
            .ok_or_else(|| GenerationError::EmptyOutput {
                identifier: identifier.clone(),
            })?;

        schema
            .validate(&payload)
            .map_err(|violation| GenerationError::SchemaValidation {
                identifier: identifier.clone(),
                violation,
            })?;

        info!(flow = %identifier, %run_id, "generation request succeeded");
        Ok(GeneratedData {
            identifier,
            data: payload,
        })
    }

    /// For decorative content: a failure is logged and yields nothing.
    pub async fn execute_optional(
        &self,
        request: &GenerationRequest,
        inputs: Option<&RuntimeInputs>,
    ) -> Option<GeneratedData> {
        match self.execute(request, inputs).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(flow = %e.identifier(), reason = e.reason(), "{}", e);
                None
            }
        }
    }
}
