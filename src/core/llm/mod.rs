pub mod generic_provider;
pub mod mock;
pub mod registry;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub use generic_provider::GenericProvider;
pub use mock::{MockProvider, MockReply};
pub use registry::{ApiFormat, AuthConfig, AuthType, ModelDef, ProviderDef, ProviderRegistry};


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    // Execute a prompt against a selected model using a structured conversation history
    async fn generate(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String>;

    /// Ask for a JSON payload shaped like `response_schema`. `Ok(None)` means
    /// the provider answered but produced no output at all.
    ///
    /// Providers without a native structured mode fall back to free text and
    /// pull the JSON out of it.
    async fn generate_structured(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        _response_schema: &Value,
    ) -> Result<Option<Value>> {
        let text = self.generate(model_id, messages).await?;
        parse_structured_output(&text)
    }
}

/// Blank text and a bare JSON `null` are absent answers; anything else has
/// to contain JSON.
pub fn parse_structured_output(text: &str) -> Result<Option<Value>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    match extract_json_from_text(text)? {
        Value::Null => Ok(None),
        value => Ok(Some(value)),
    }
}

/// Lenient JSON extraction for model output: bare JSON, the outermost
/// `{...}` span, or a fenced code block.
pub fn extract_json_from_text(s: &str) -> Result<Value> {
    let t = s.trim().trim_matches('\u{feff}');

    if let Ok(v) = serde_json::from_str::<Value>(t) {
        return Ok(v);
    }

    if let (Some(i), Some(j)) = (t.find('{'), t.rfind('}'))
        && i < j
        && let Ok(v) = serde_json::from_str::<Value>(&t[i..=j])
    {
        return Ok(v);
    }

    for fence in ["```json", "```"] {
        if let Some(start) = t.find(fence) {
            let body_start = start + fence.len();
            if let Some(end) = t[body_start..].find("```")
                && let Ok(v) = serde_json::from_str::<Value>(t[body_start..body_start + end].trim())
            {
                return Ok(v);
            }
        }
    }

    Err(anyhow!("no valid JSON found in model output"))
}

pub struct LlmManager {
    providers: Vec<Arc<dyn LlmProvider>>,
    selected_provider: Option<String>,
    selected_model: Option<String>,
}

impl Default for LlmManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmManager {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            selected_provider: None,
            selected_model: None,
        }
    }

    pub fn register_provider(&mut self, provider: Arc<dyn LlmProvider>) {
        info!("Registered LLM Provider: {}", provider.provider_id());
        self.providers.push(provider);
    }

    pub fn set_active(&mut self, provider_id: &str, model_id: &str) {
        info!("Setting active LLM: {} ({})", provider_id, model_id);
        self.selected_provider = Some(provider_id.to_string());
        self.selected_model = Some(model_id.to_string());
    }

    pub fn get_provider(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers
            .iter()
            .find(|p| p.provider_id() == provider_id)
            .cloned()
    }

    pub fn list_providers(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.provider_id().to_string())
            .collect()
    }

    pub fn get_active_info(&self) -> (Option<&String>, Option<&String>) {
        (self.selected_provider.as_ref(), self.selected_model.as_ref())
    }

    /// The selected provider together with the model to run it with.
    pub fn active(&self) -> Result<(Arc<dyn LlmProvider>, String)> {
        let provider_id = self.selected_provider.as_ref().ok_or_else(|| {
            anyhow!("No LLM Provider selected. Set `provider` in bizstudio.toml.")
        })?;

        let model_id = self
            .selected_model
            .clone()
            .ok_or_else(|| anyhow!("No LLM Model selected."))?;

        let provider = self
            .get_provider(provider_id)
            .ok_or_else(|| anyhow!("Selected provider not found in registry"))?;

        Ok((provider, model_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_bare_json() {
        let v = extract_json_from_text(r#"  {"a": 1} "#).unwrap();
        assert_eq!(v, json!({ "a": 1 }));
    }

    #[test]
    fn extracts_json_surrounded_by_prose() {
        let v = extract_json_from_text("Sure! Here it is: {\"a\": [1, 2]} Hope that helps.").unwrap();
        assert_eq!(v, json!({ "a": [1, 2] }));
    }

    #[test]
    fn extracts_fenced_array() {
        let v = extract_json_from_text("```json\n[1, 2, 3]\n```").unwrap();
        assert_eq!(v, json!([1, 2, 3]));
    }

    #[test]
    fn prose_without_json_is_an_error() {
        assert!(extract_json_from_text("I cannot help with that.").is_err());
    }

    #[test]
    fn blank_output_is_absent() {
        assert_eq!(parse_structured_output("   \n").unwrap(), None);
    }

    #[test]
    fn json_null_output_is_absent() {
        assert_eq!(parse_structured_output(" null ").unwrap(), None);
        assert_eq!(
            parse_structured_output("{\"faqs\": null}").unwrap(),
            Some(json!({ "faqs": null }))
        );
    }

    #[tokio::test]
    async fn active_requires_a_selection() {
        let mut manager = LlmManager::new();
        manager.register_provider(Arc::new(MockProvider::new("mock")));
        assert!(manager.active().is_err());

        manager.set_active("mock", "mock-model");
        let (provider, model) = manager.active().unwrap();
        assert_eq!(provider.provider_id(), "mock");
        assert_eq!(model, "mock-model");
    }

    #[tokio::test]
    async fn active_rejects_unknown_provider() {
        let mut manager = LlmManager::new();
        manager.set_active("ghost", "m");
        let err = manager.active().err().unwrap();
        assert!(err.to_string().contains("not found"));
    }
}
