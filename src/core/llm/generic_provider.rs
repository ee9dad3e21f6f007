use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::registry::{ApiFormat, AuthType, ProviderDef};
use super::{ChatMessage, LlmProvider, parse_structured_output};

// ── OpenAI-compatible request/response ──

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageOwned,
}

#[derive(Deserialize)]
struct OpenAiMessageOwned {
    #[serde(default)]
    content: Option<String>,
}

// ── Gemini request/response ──

#[derive(Serialize)]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    response_mime_type: &'static str,
    response_json_schema: Value,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResContent>,
}

#[derive(Deserialize)]
struct GeminiResContent {
    #[serde(default)]
    parts: Vec<GeminiResPart>,
}

#[derive(Deserialize)]
struct GeminiResPart {
    #[serde(default)]
    text: Option<String>,
}

/// Leading system messages become the system instruction; later ones are
/// folded into user turns with a `[SYSTEM]` prefix. Consecutive same-role
/// turns are merged because Gemini requires strictly alternating roles.
fn build_gemini_contents(messages: &[ChatMessage]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
    let mut contents: Vec<GeminiContent> = Vec::new();
    let mut system_instruction: Option<GeminiContent> = None;
    let mut past_first_non_system = false;

    for m in messages {
        let (role, text) = if m.role == "system" && !past_first_non_system {
            match system_instruction.as_mut().and_then(|si| si.parts.first_mut()) {
                Some(part) => {
                    part.text.push('\n');
                    part.text.push_str(&m.content);
                }
                None => {
                    system_instruction = Some(GeminiContent {
                        role: "user".to_string(),
                        parts: vec![GeminiPart {
                            text: m.content.clone(),
                        }],
                    });
                }
            }
            continue;
        } else if m.role == "system" {
            ("user", format!("[SYSTEM] {}", m.content))
        } else {
            past_first_non_system = true;
            let role = if m.role == "assistant" { "model" } else { "user" };
            (role, m.content.clone())
        };

        let should_merge = contents.last().map(|c| c.role == role).unwrap_or(false);
        if should_merge {
            if let Some(last) = contents.last_mut()
                && let Some(part) = last.parts.first_mut()
            {
                part.text.push('\n');
                part.text.push_str(&text);
            }
        } else {
            contents.push(GeminiContent {
                role: role.to_string(),
                parts: vec![GeminiPart { text }],
            });
        }
    }

    (system_instruction, contents)
}

fn gemini_text(parsed: GeminiResponse) -> String {
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

// ── Generic Provider ──

pub struct GenericProvider {
    provider_def: ProviderDef,
    api_key: String,
    client: Client,
}

impl GenericProvider {
    pub fn new(provider_def: ProviderDef, api_key: String) -> Self {
        Self {
            provider_def,
            api_key,
            client: Client::new(),
        }
    }

    /// Read the key from the environment variable the registry names.
    pub fn from_env(provider_def: ProviderDef) -> Result<Self> {
        let var = provider_def.auth.api_key_env.clone();
        let api_key = std::env::var(&var).map_err(|_| {
            anyhow!(
                "{} API key not set: export {} before starting",
                provider_def.name,
                var
            )
        })?;
        Ok(Self::new(provider_def, api_key))
    }

    fn endpoint(&self, model_id: &str) -> String {
        self.provider_def.base_url.replace("{model}", model_id)
    }

    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        request = match self.provider_def.auth.auth_type {
            AuthType::Bearer => {
                let header = self
                    .provider_def
                    .auth
                    .header_name
                    .as_deref()
                    .unwrap_or("Authorization");
                request.header(header, format!("Bearer {}", self.api_key))
            }
            AuthType::Header => {
                let header = self
                    .provider_def
                    .auth
                    .header_name
                    .as_deref()
                    .unwrap_or("x-api-key");
                request.header(header, &self.api_key)
            }
            AuthType::QueryParam => {
                let param_name = self
                    .provider_def
                    .auth
                    .param_name
                    .as_deref()
                    .unwrap_or("key");
                request.query(&[(param_name, self.api_key.as_str())])
            }
        };
        for (name, value) in &self.provider_def.extra_headers {
            request = request.header(name, value);
        }
        request
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        model_id: &str,
        body: &B,
    ) -> Result<R> {
        let request = self.authorize(self.client.post(self.endpoint(model_id)).json(body));
        let res = request.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            return Err(anyhow!(
                "{} API Error ({}): {}",
                self.provider_def.name,
                status,
                res.text().await.unwrap_or_default()
            ));
        }
        Ok(res.json().await?)
    }

    async fn generate_openai(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        response_schema: Option<&Value>,
    ) -> Result<String> {
        let req = OpenAiRequest {
            model: model_id,
            messages: messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
            response_format: response_schema.map(|schema| {
                json!({
                    "type": "json_schema",
                    "json_schema": { "name": "structured_output", "schema": schema }
                })
            }),
        };

        let parsed: OpenAiResponse = self.post_json(model_id, &req).await?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn generate_gemini(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        response_schema: Option<&Value>,
    ) -> Result<String> {
        let (system_instruction, contents) = build_gemini_contents(messages);
        let req = GeminiRequest {
            system_instruction,
            contents,
            generation_config: response_schema.map(|schema| GeminiGenerationConfig {
                response_mime_type: "application/json",
                response_json_schema: schema.clone(),
            }),
        };

        let parsed: GeminiResponse = self.post_json(model_id, &req).await?;
        Ok(gemini_text(parsed))
    }
}

#[async_trait]
impl LlmProvider for GenericProvider {
    fn provider_id(&self) -> &str {
        &self.provider_def.id
    }

    async fn generate(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String> {
        match self.provider_def.api_format {
            ApiFormat::Openai => self.generate_openai(model_id, messages, None).await,
            ApiFormat::Gemini => self.generate_gemini(model_id, messages, None).await,
        }
    }

    async fn generate_structured(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        response_schema: &Value,
    ) -> Result<Option<Value>> {
        let text = match self.provider_def.api_format {
            ApiFormat::Openai => {
                self.generate_openai(model_id, messages, Some(response_schema))
                    .await?
            }
            ApiFormat::Gemini => {
                self.generate_gemini(model_id, messages, Some(response_schema))
                    .await?
            }
        };
        debug!(
            provider = %self.provider_def.id,
            chars = text.len(),
            "structured response received"
        );
        parse_structured_output(&text)
    }
}
