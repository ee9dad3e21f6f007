use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

const PROVIDERS_JSON: &str = include_str!("providers.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRegistry {
    pub providers: Vec<ProviderDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDef {
    pub id: String,
    pub name: String,
    pub api_format: ApiFormat,
    /// Endpoint URL. Gemini-format URLs contain a `{model}` placeholder.
    pub base_url: String,
    pub auth: AuthConfig,
    pub default_model: String,
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormat {
    Openai,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    #[serde(default)]
    pub param_name: Option<String>,
    /// Custom header name for the API key (defaults to "Authorization" with "Bearer " prefix for bearer type)
    #[serde(default)]
    pub header_name: Option<String>,
    /// Environment variable holding the key.
    pub api_key_env: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Bearer,
    QueryParam,
    /// Raw header: sends the key as-is in the header specified by `header_name`
    Header,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub id: String,
    pub name: String,
}

impl ProviderRegistry {
    pub fn load() -> Result<Self> {
        serde_json::from_str(PROVIDERS_JSON).context("built-in providers.json is invalid")
    }

    /// Built-in providers plus the ones declared in `custom_path`, if it
    /// exists. A custom entry replaces a built-in one with the same id.
    pub fn load_with_custom(custom_path: &Path) -> Result<Self> {
        let mut registry = Self::load()?;
        if !custom_path.exists() {
            return Ok(registry);
        }

        let content = std::fs::read_to_string(custom_path)
            .with_context(|| format!("reading {}", custom_path.display()))?;
        let custom: ProviderRegistry = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", custom_path.display()))?;

        for def in custom.providers {
            info!("Loaded custom provider '{}'", def.id);
            registry.providers.retain(|p| p.id != def.id);
            registry.providers.push(def);
        }
        Ok(registry)
    }

    pub fn get_provider(&self, id: &str) -> Option<&ProviderDef> {
        let normalized = id.to_lowercase();
        self.providers
            .iter()
            .find(|p| p.id == normalized || p.name.to_lowercase() == normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_parses() {
        let registry = ProviderRegistry::load().unwrap();
        let google = registry.get_provider("google").unwrap();
        assert_eq!(google.api_format, ApiFormat::Gemini);
        assert!(google.base_url.contains("{model}"));
        assert!(registry.get_provider("OpenAI").is_some());
    }

    #[test]
    fn lookup_by_display_name_is_case_insensitive() {
        let registry = ProviderRegistry::load().unwrap();
        assert_eq!(
            registry.get_provider("google gemini").map(|p| p.id.as_str()),
            Some("google")
        );
        assert!(registry.get_provider("nope").is_none());
    }

    #[test]
    fn custom_file_overrides_and_extends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom_providers.json");
        std::fs::write(
            &path,
            r#"{"providers": [{
                "id": "local",
                "name": "Local",
                "api_format": "openai",
                "base_url": "http://127.0.0.1:9/v1/chat/completions",
                "auth": { "type": "bearer", "api_key_env": "LOCAL_KEY" },
                "default_model": "m",
                "models": [{ "id": "m", "name": "M" }]
            }]}"#,
        )
        .unwrap();

        let registry = ProviderRegistry::load_with_custom(&path).unwrap();
        assert!(registry.get_provider("google").is_some());
        let local = registry.get_provider("local").unwrap();
        assert!(local.extra_headers.is_empty());
    }

    #[test]
    fn missing_custom_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            ProviderRegistry::load_with_custom(&dir.path().join("absent.json")).unwrap();
        assert_eq!(
            registry.providers.len(),
            ProviderRegistry::load().unwrap().providers.len()
        );
    }
}
